use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::app::view::{self, ProductRow, TableView};
use crate::app::{App, AppState};
use crate::catalog::format::{
    category_detail, format_price, normalize_image, sanitize_display,
};
use crate::catalog::{CatalogApi, Product, ProductPayload};
use crate::config::AppConfig;
use crate::export;
use crate::pagination::PageSize;
use crate::search::{SortDirection, SortField, SortSpec};

#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Case-insensitive title filter
    #[arg(long)]
    pub search: Option<String>,
    /// Sort column (defaults to the configured sort)
    #[arg(long, value_enum)]
    pub sort: Option<SortField>,
    /// Sort descending instead of ascending
    #[arg(long)]
    pub desc: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub query: QueryArgs,
    /// 1-based page number
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    /// Rows per page (5, 10, 20 or 50)
    #[arg(long)]
    pub page_size: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Product identifier
    pub id: i64,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub query: QueryArgs,
    /// Target file, or a directory to write products.csv into
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub price: String,
    #[arg(long)]
    pub description: String,
    #[arg(long)]
    pub category_id: String,
    /// Image URL
    #[arg(long)]
    pub image: String,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    /// Product identifier
    pub id: i64,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub price: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
}

pub fn run_tui(app: &mut App) -> Result<()> {
    app.run()
}

pub fn list_products(config: &AppConfig, api: &dyn CatalogApi, args: ListArgs) -> Result<()> {
    let output = render_list(config, api, &args)?;
    print!("{output}");
    Ok(())
}

fn render_list(config: &AppConfig, api: &dyn CatalogApi, args: &ListArgs) -> Result<String> {
    let page_size = match args.page_size {
        Some(size) => PageSize::try_from(size).map_err(anyhow::Error::msg)?,
        None => config.page_size(),
    };
    let mut state = load_state(config, api, &args.query, page_size)?;
    if args.page != 1 && !state.go_to_page(args.page) {
        bail!(
            "page {} is out of range (1-{})",
            args.page,
            state.window().total_pages.max(1)
        );
    }

    let view = view::render(&state);
    let mut out = match &view.table {
        TableView::Rows(rows) => format_table(rows),
        _ => "No products found.\n".to_string(),
    };
    let _ = writeln!(&mut out, "{}", view.info);
    let window = state.window();
    if window.total_pages > 1 {
        let _ = writeln!(&mut out, "Page {} of {}", window.page, window.total_pages);
    }
    Ok(out)
}

pub fn show_product(api: &dyn CatalogApi, args: ShowArgs) -> Result<()> {
    let product = api
        .get(args.id)
        .with_context(|| format!("fetching product #{}", args.id))?;
    print!("{}", format_detail(&product));
    Ok(())
}

pub fn export_products(config: &AppConfig, api: &dyn CatalogApi, args: ExportArgs) -> Result<()> {
    let state = load_state(config, api, &args.query, config.page_size())?;
    let target = args.output.unwrap_or_else(|| config.export.target_dir());
    let written = if target.is_dir() {
        export::write_csv(&target, state.working_products())?
    } else {
        export::write_csv_to(&target, state.working_products())?
    };
    println!(
        "Exported {} products to {}",
        state.working_len(),
        written.display()
    );
    Ok(())
}

pub fn create_product(api: &dyn CatalogApi, args: CreateArgs) -> Result<()> {
    let payload = ProductPayload::for_create(
        &args.title,
        &args.price,
        &args.description,
        &args.category_id,
        &args.image,
    )?;
    let created = api.create(&payload).context("creating product")?;
    tracing::info!(id = created.id, "product created");
    println!("Created product #{}", created.id);
    print!("{}", format_detail(&created));
    Ok(())
}

pub fn update_product(api: &dyn CatalogApi, args: UpdateArgs) -> Result<()> {
    let updated = apply_update(api, &args)?;
    println!("Updated product #{}", updated.id);
    print!("{}", format_detail(&updated));
    Ok(())
}

fn apply_update(api: &dyn CatalogApi, args: &UpdateArgs) -> Result<Product> {
    if args.title.is_none() && args.price.is_none() && args.description.is_none() {
        bail!("nothing to update; pass --title, --price or --description");
    }
    let mut product = api
        .get(args.id)
        .with_context(|| format!("fetching product #{}", args.id))?;
    let price = product.price.to_string();
    let payload = ProductPayload::for_update(
        &product,
        args.title.as_deref().unwrap_or(&product.title),
        args.price.as_deref().unwrap_or(&price),
        args.description.as_deref().unwrap_or(&product.description),
    )?;
    let patch = api.update(args.id, &payload).map_err(|err| {
        if err.is_internal_server_error() {
            anyhow::Error::new(err).context(
                "updating product (the server rejected it; the stored record may hold invalid data)",
            )
        } else {
            anyhow::Error::new(err).context("updating product")
        }
    })?;
    product.merge(patch);
    Ok(product)
}

fn load_state(
    config: &AppConfig,
    api: &dyn CatalogApi,
    query: &QueryArgs,
    page_size: PageSize,
) -> Result<AppState> {
    let sort = match query.sort {
        Some(field) => {
            let direction = if query.desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            SortSpec::by(field, direction)
        }
        None => config.view.default_sort,
    };
    let products = api.list().context("loading products")?;
    tracing::debug!(count = products.len(), "products loaded");
    let mut state = AppState::new(page_size, sort);
    state.replace_products(products);
    if let Some(search) = &query.search {
        state.set_query(search.as_str());
    }
    Ok(state)
}

fn format_table(rows: &[ProductRow]) -> String {
    let title_width = rows
        .iter()
        .map(|row| row.title.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(5, 40);
    let mut out = String::new();
    let _ = writeln!(
        &mut out,
        "{:>5}  {:<title_width$}  {:>10}  {:<16}  {}",
        "ID", "Title", "Price", "Category", "Image"
    );
    for row in rows {
        let title: String = if row.title.chars().count() > title_width {
            let mut cut: String = row.title.chars().take(title_width - 1).collect();
            cut.push('…');
            cut
        } else {
            row.title.clone()
        };
        let _ = writeln!(
            &mut out,
            "{:>5}  {:<title_width$}  {:>10}  {:<16}  {}",
            row.id, title, row.price, row.category, row.image_url
        );
    }
    out
}

fn format_detail(product: &Product) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "#{}  {}", product.id, sanitize_display(&product.title));
    let _ = writeln!(&mut out, "    price       {}", format_price(product.price));
    let _ = writeln!(&mut out, "    category    {}", category_detail(product));
    let _ = writeln!(&mut out, "    image       {}", normalize_image(&product.images));
    let _ = writeln!(
        &mut out,
        "    description {}",
        sanitize_display(&product.description)
    );
    out
}
