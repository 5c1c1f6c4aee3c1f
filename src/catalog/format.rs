//! Display helpers for remote product data.

use super::Product;

/// Thumbnail shown when a product carries no usable image.
pub const PLACEHOLDER_IMAGE: &str = "https://placehold.co/50";

/// Picks the first image URL, undoing the upstream defect where the list
/// arrives stringified (`["http://..."]`) inside its first element.
///
/// Only that one malformed shape is recognised; anything else is returned as is.
pub fn normalize_image(images: &[String]) -> String {
    let Some(first) = images.first().filter(|url| !url.trim().is_empty()) else {
        return PLACEHOLDER_IMAGE.to_string();
    };
    match first.strip_prefix("[\"") {
        Some(rest) => rest.replacen("\"]", "", 1).replacen('"', "", 1),
        None => first.clone(),
    }
}

/// Makes remote text safe for a terminal cell: control characters are dropped
/// and runs of line breaks or tabs collapse into one space.
pub fn sanitize_display(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if matches!(ch, '\n' | '\r' | '\t') {
            pending_space = true;
            continue;
        }
        if ch.is_control() {
            continue;
        }
        if pending_space && !out.is_empty() && !out.ends_with(' ') {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }
    out
}

pub fn format_price(price: f64) -> String {
    format!("${price}")
}

/// Category name for the table, `Unknown` when absent.
pub fn category_label(product: &Product) -> String {
    category_name(product).unwrap_or_else(|| "Unknown".to_string())
}

/// Category name for the detail view, `N/A` when absent.
pub fn category_detail(product: &Product) -> String {
    category_name(product).unwrap_or_else(|| "N/A".to_string())
}

fn category_name(product: &Product) -> Option<String> {
    product
        .category
        .as_ref()
        .map(|c| sanitize_display(&c.name))
        .filter(|name| !name.is_empty())
}
