use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_with::formats::PreferMany;
use serde_with::{serde_as, DefaultOnNull, OneOrMany};
use thiserror::Error;

use crate::config::ApiOptions;

pub mod format;
mod payload;

pub use payload::{ProductPayload, ValidationError, UPDATE_FALLBACK_CATEGORY, UPDATE_FALLBACK_IMAGE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// A product as served by the catalog endpoint.
///
/// `images` tolerates the upstream shapes seen in the wild: a JSON array, a
/// bare string, or `null`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde_as(as = "DefaultOnNull<OneOrMany<_, PreferMany>>")]
    #[serde(default)]
    pub images: Vec<String>,
}

impl Product {
    /// Shallow override: every field present in `patch` replaces the local value.
    pub fn merge(&mut self, patch: ProductPatch) {
        let ProductPatch {
            title,
            price,
            description,
            category,
            images,
        } = patch;
        if let Some(title) = title {
            self.title = title;
        }
        if let Some(price) = price {
            self.price = price;
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(category) = category {
            self.category = Some(category);
        }
        if let Some(images) = images {
            self.images = images;
        }
    }

    pub fn category_id(&self) -> Option<i64> {
        self.category.as_ref().map(|c| c.id)
    }
}

/// Update response, decoded with every field optional.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde_as(as = "Option<OneOrMany<_, PreferMany>>")]
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid catalog url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl CatalogError {
    /// Message suitable for a one-shot notification.
    pub fn user_message(&self) -> String {
        match self {
            CatalogError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_internal_server_error(&self) -> bool {
        match self {
            CatalogError::Status { status, message } => {
                *status == 500 || message.contains("Internal server error")
            }
            _ => false,
        }
    }
}

/// Remote list/get/create/update operations against the product resource.
pub trait CatalogApi: Send + Sync {
    fn list(&self) -> Result<Vec<Product>, CatalogError>;
    fn get(&self, id: i64) -> Result<Product, CatalogError>;
    fn create(&self, payload: &ProductPayload) -> Result<Product, CatalogError>;
    fn update(&self, id: i64, payload: &ProductPayload) -> Result<ProductPatch, CatalogError>;
}

#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: Client,
    base_url: Url,
}

impl HttpCatalog {
    pub fn new(options: &ApiOptions) -> Result<Self, CatalogError> {
        let base_url = parse_base_url(&options.base_url)?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(agent) = HeaderValue::from_str(&options.user_agent) {
            headers.insert(USER_AGENT, agent);
        } else {
            tracing::warn!(agent = %options.user_agent, "ignoring invalid user agent");
        }
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(options.timeout_secs.max(1)))
            .build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn item_url(&self, id: i64) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&id.to_string());
        }
        url
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, CatalogError> {
        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            let message = error_message(&body)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "API Error".to_string());
            tracing::debug!(status = status.as_u16(), %message, "catalog request rejected");
            return Err(CatalogError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

impl CatalogApi for HttpCatalog {
    fn list(&self) -> Result<Vec<Product>, CatalogError> {
        tracing::debug!(url = %self.base_url, "listing products");
        self.send(self.client.get(self.base_url.clone()))
    }

    fn get(&self, id: i64) -> Result<Product, CatalogError> {
        self.send(self.client.get(self.item_url(id)))
    }

    fn create(&self, payload: &ProductPayload) -> Result<Product, CatalogError> {
        tracing::debug!(title = %payload.title, "creating product");
        self.send(self.client.post(self.base_url.clone()).json(payload))
    }

    fn update(&self, id: i64, payload: &ProductPayload) -> Result<ProductPatch, CatalogError> {
        tracing::debug!(id, "updating product");
        self.send(self.client.put(self.item_url(id)).json(payload))
    }
}

fn parse_base_url(raw: &str) -> Result<Url, CatalogError> {
    Url::parse(raw.trim()).map_err(|err| CatalogError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })
}

/// Pulls the `message` field out of an error body; arrays of messages are joined.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return Some(trimmed.to_string());
    };
    match value.get("message") {
        Some(serde_json::Value::String(message)) => Some(message.clone()),
        Some(serde_json::Value::Array(items)) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            Some(parts.join("; "))
        }
        _ => Some(value.to_string()),
    }
}
