use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::catalog::Product;

pub const EXPORT_FILE_NAME: &str = "products.csv";
const EXPORT_TMP_EXTENSION: &str = "csv.tmp";
const HEADER: &str = "ID,Title,Price,Description";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No data!")]
    Empty,
    #[error("writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Renders the rows in the given order. Title and description are quoted
/// with inner quotes doubled; id and price are written bare.
pub fn render_csv<'a, I>(products: I) -> Result<String, ExportError>
where
    I: IntoIterator<Item = &'a Product>,
{
    let mut out = String::from(HEADER);
    let mut rows = 0usize;
    for product in products {
        let _ = write!(
            &mut out,
            "\n{},{},{},{}",
            product.id,
            quote(&product.title),
            product.price,
            quote(&product.description)
        );
        rows += 1;
    }
    if rows == 0 {
        return Err(ExportError::Empty);
    }
    Ok(out)
}

/// Writes `products.csv` into `dir`, returning the final path.
pub fn write_csv<'a, I>(dir: &Path, products: I) -> Result<PathBuf, ExportError>
where
    I: IntoIterator<Item = &'a Product>,
{
    write_csv_to(&dir.join(EXPORT_FILE_NAME), products)
}

pub fn write_csv_to<'a, I>(path: &Path, products: I) -> Result<PathBuf, ExportError>
where
    I: IntoIterator<Item = &'a Product>,
{
    let csv = render_csv(products)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let tmp_path = path.with_extension(EXPORT_TMP_EXTENSION);
    fs::write(&tmp_path, csv.as_bytes()).map_err(io_error(&tmp_path))?;
    fs::rename(&tmp_path, path).map_err(io_error(path))?;
    tracing::info!(path = %path.display(), "exported products");
    Ok(path.to_path_buf())
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ExportError {
    let path = path.to_path_buf();
    move |source| ExportError::Io { path, source }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
