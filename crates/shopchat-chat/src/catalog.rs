//! Product catalog listing for the landing view.
//!
//! Shown in the order the server sends; no ranking applies.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use shopchat_core::config::SearchConfig;
use shopchat_core::ProductRef;

use crate::error::ChatError;
use crate::search::{build_client, fetch_json, parse_product_list};

/// A remote source of the full product listing.
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn list_products(&self) -> Result<Vec<ProductRef>, ChatError>;
}

/// Validate a catalog body: either a bare array or an object with `items`.
pub fn parse_catalog(body: &Value) -> Vec<ProductRef> {
    match body {
        Value::Object(obj) => obj
            .get("items")
            .map(|items| parse_product_list(items, "items"))
            .unwrap_or_default(),
        other => parse_product_list(other, "products"),
    }
}

/// [`CatalogService`] over the backend's JSON HTTP API.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    client: reqwest::Client,
    config: SearchConfig,
}

impl HttpCatalogClient {
    pub fn new(config: SearchConfig) -> Result<Self, ChatError> {
        let client = build_client(&config)?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl CatalogService for HttpCatalogClient {
    async fn list_products(&self) -> Result<Vec<ProductRef>, ChatError> {
        let url = self.config.endpoint("products");
        debug!(url = %url, "Fetching catalog");
        let body = fetch_json(self.client.get(&url)).await?;
        Ok(parse_catalog(&body))
    }
}
