use serde::Serialize;
use thiserror::Error;

use super::Product;

/// Category sent on update when the loaded record has none.
pub const UPDATE_FALLBACK_CATEGORY: i64 = 1;
/// Image list sent on update when the loaded record has none.
pub const UPDATE_FALLBACK_IMAGE: &str = "https://placehold.co/640x480";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("price must be a non-negative number (got '{0}')")]
    InvalidPrice(String),
    #[error("category id must be a positive integer (got '{0}')")]
    InvalidCategory(String),
}

/// Request body shared by create (POST) and update (PUT).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPayload {
    pub title: String,
    pub price: f64,
    pub description: String,
    pub category_id: i64,
    pub images: Vec<String>,
}

impl ProductPayload {
    pub fn for_create(
        title: &str,
        price: &str,
        description: &str,
        category_id: &str,
        image: &str,
    ) -> Result<Self, ValidationError> {
        let title = required("title", title)?;
        let price = parse_price(price)?;
        let description = required("description", description)?;
        let category_id = parse_category(category_id)?;
        let image = required("image", image)?;
        Ok(Self {
            title,
            price,
            description,
            category_id,
            images: vec![image],
        })
    }

    /// The edit form only captures title, price and description; category and
    /// images are resupplied from the loaded record since the endpoint rejects
    /// updates without them.
    pub fn for_update(
        existing: &Product,
        title: &str,
        price: &str,
        description: &str,
    ) -> Result<Self, ValidationError> {
        let title = required("title", title)?;
        let price = parse_price(price)?;
        let description = required("description", description)?;
        let images = if existing.images.is_empty() {
            vec![UPDATE_FALLBACK_IMAGE.to_string()]
        } else {
            existing.images.clone()
        };
        Ok(Self {
            title,
            price,
            description,
            category_id: existing.category_id().unwrap_or(UPDATE_FALLBACK_CATEGORY),
            images,
        })
    }
}

fn required(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(value.to_string())
}

fn parse_price(raw: &str) -> Result<f64, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField("price"));
    }
    match trimmed.parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => Ok(price),
        _ => Err(ValidationError::InvalidPrice(trimmed.to_string())),
    }
}

fn parse_category(raw: &str) -> Result<i64, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField("category id"));
    }
    match trimmed.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ValidationError::InvalidCategory(trimmed.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;
    use assert_matches::assert_matches;

    fn loaded(images: Vec<String>, category: Option<Category>) -> Product {
        Product {
            id: 3,
            title: "Shirt".into(),
            price: 5.0,
            description: "Plain".into(),
            category,
            images,
        }
    }

    #[test]
    fn create_payload_serializes_camel_case() {
        let payload =
            ProductPayload::for_create(" Cap ", "10", "Wool cap", "2", "https://img/cap.png")
                .expect("valid");
        let json = serde_json::to_value(&payload).expect("json");
        assert_eq!(json["title"], "Cap");
        assert_eq!(json["categoryId"], 2);
        assert_eq!(json["images"][0], "https://img/cap.png");
        assert_eq!(json["price"], 10.0);
    }

    #[test]
    fn create_rejects_missing_and_non_numeric_fields() {
        assert_matches!(
            ProductPayload::for_create("", "10", "d", "1", "i"),
            Err(ValidationError::MissingField("title"))
        );
        assert_matches!(
            ProductPayload::for_create("t", "ten", "d", "1", "i"),
            Err(ValidationError::InvalidPrice(raw)) if raw == "ten"
        );
        assert_matches!(
            ProductPayload::for_create("t", "-1", "d", "1", "i"),
            Err(ValidationError::InvalidPrice(_))
        );
        assert_matches!(
            ProductPayload::for_create("t", "1", "d", "abc", "i"),
            Err(ValidationError::InvalidCategory(_))
        );
        assert_matches!(
            ProductPayload::for_create("t", "1", "d", "1", "  "),
            Err(ValidationError::MissingField("image"))
        );
    }

    #[test]
    fn update_resupplies_category_and_images() {
        let existing = loaded(
            vec!["https://img/shirt.png".into()],
            Some(Category {
                id: 4,
                name: "Clothes".into(),
            }),
        );
        let payload =
            ProductPayload::for_update(&existing, "Shirt v2", "6.5", "Plain tee").expect("valid");
        assert_eq!(payload.category_id, 4);
        assert_eq!(payload.images, vec!["https://img/shirt.png".to_string()]);
        assert_eq!(payload.price, 6.5);
    }

    #[test]
    fn update_falls_back_when_record_lacks_category_and_images() {
        let existing = loaded(Vec::new(), None);
        let payload = ProductPayload::for_update(&existing, "Shirt", "5", "Plain").expect("valid");
        assert_eq!(payload.category_id, UPDATE_FALLBACK_CATEGORY);
        assert_eq!(payload.images, vec![UPDATE_FALLBACK_IMAGE.to_string()]);
    }

    #[test]
    fn update_requires_description() {
        let existing = loaded(Vec::new(), None);
        assert_matches!(
            ProductPayload::for_update(&existing, "Shirt", "5", ""),
            Err(ValidationError::MissingField("description"))
        );
    }
}
