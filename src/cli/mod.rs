use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::catalog::HttpCatalog;
use crate::config::{ConfigLoader, API_URL_ENV, CONFIG_ENV};

pub mod commands;

use self::commands::{CreateArgs, ExportArgs, ListArgs, ShowArgs, UpdateArgs};

const LOG_FILE: &str = "catalog-admin.log";

#[derive(Parser, Debug)]
#[command(
    name = "catalog-admin",
    version,
    about = "Keyboard-first admin view for a remote product catalog"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over CATALOG_ADMIN_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the product resource URL (takes precedence over CATALOG_ADMIN_API_URL)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive table view (default)
    Tui,
    /// Print one page of the filtered and sorted catalog
    List(ListArgs),
    /// Print a single product
    Show(ShowArgs),
    /// Write the filtered and sorted catalog to a CSV file
    Export(ExportArgs),
    /// Create a product
    Create(CreateArgs),
    /// Update title, price or description of a product
    Update(UpdateArgs),
}

/// Where log output goes; the interactive view owns the terminal.
enum LogTarget<'a> {
    Stderr,
    File(&'a Path),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(url) = &cli.api_url {
        env::set_var(API_URL_ENV, url);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli.command.unwrap_or(Commands::Tui);
    let target = match command {
        Commands::Tui => LogTarget::File(&paths.log_dir),
        _ => LogTarget::Stderr,
    };
    init_tracing(&cli.log_level, target)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = Arc::new(loader.load_or_init()?);
    tracing::debug!(config = %paths.config_file.display(), api = %config.api.base_url, "configuration loaded");

    let api = HttpCatalog::new(&config.api).context("building catalog client")?;
    match command {
        Commands::Tui => {
            if !atty::is(atty::Stream::Stdout) {
                bail!("the interactive view needs a terminal; try `catalog-admin list`");
            }
            let mut app = App::new(config.clone(), Arc::new(api));
            commands::run_tui(&mut app)
        }
        Commands::List(args) => commands::list_products(&config, &api, args),
        Commands::Show(args) => commands::show_product(&api, args),
        Commands::Export(args) => commands::export_products(&config, &api, args),
        Commands::Create(args) => commands::create_product(&api, args),
        Commands::Update(args) => commands::update_product(&api, args),
    }
}

fn init_tracing(level: &str, target: LogTarget<'_>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match target {
            LogTarget::Stderr => fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init(),
            LogTarget::File(dir) => {
                let path = dir.join(LOG_FILE);
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
        }
        Ok::<(), anyhow::Error>(())
    })
    .map(|_| ())
}
