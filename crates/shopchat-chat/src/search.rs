//! Search collaborator contract and its HTTP transport.
//!
//! The remote service answers a free-text query with prose and a list of
//! candidate products. Its JSON is loosely shaped, so everything is
//! validated and defaulted here and the rest of the crate only sees
//! [`SearchResponse`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use shopchat_core::config::SearchConfig;
use shopchat_core::{ProductId, ProductRef};

use crate::error::ChatError;

// =============================================================================
// Contract
// =============================================================================

/// A remote service that answers shopping queries.
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Run one query, asking for at most `limit` products.
    ///
    /// Fails on any transport problem, non-success status, or unreadable body.
    async fn search(&self, query: &str, limit: usize) -> Result<SearchResponse, ChatError>;
}

/// Validated search result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    /// Answer prose; `None` when missing or blank.
    pub answer: Option<String>,
    /// Candidate products in the order the service sent them.
    pub results: Vec<ProductRef>,
    /// The service's own pick for the highlighted product.
    pub primary_product_id: Option<ProductId>,
}

impl SearchResponse {
    /// Validate a decoded response body.
    ///
    /// Only a non-object body is an error; missing or mistyped fields are
    /// defaulted and unusable products are dropped.
    pub fn from_value(body: &Value) -> Result<Self, ChatError> {
        let obj = body.as_object().ok_or_else(|| {
            ChatError::Decode(format!("expected a JSON object, got {}", kind(body)))
        })?;

        let answer = match obj.get("answer") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::String(_)) | Some(Value::Null) | None => None,
            Some(other) => {
                warn!(kind = kind(other), "Ignoring non-string answer");
                None
            }
        };

        let results = match obj.get("results") {
            Some(value) => parse_product_list(value, "results"),
            None => Vec::new(),
        };

        let primary_product_id = parse_id(obj.get("primary_product_id"));

        Ok(Self {
            answer,
            results,
            primary_product_id,
        })
    }
}

// =============================================================================
// Boundary validation
// =============================================================================

/// Parse an array of raw products, dropping anything unusable.
pub(crate) fn parse_product_list(value: &Value, field: &str) -> Vec<ProductRef> {
    let Some(items) = value.as_array() else {
        warn!(field, kind = kind(value), "Expected a product array; using none");
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let product = parse_product(item);
            if product.is_none() {
                warn!(field, index, "Dropping product without an object shape or id");
            }
            product
        })
        .collect()
}

/// Parse one raw product. Requires an object with `product_id` or `id`.
pub(crate) fn parse_product(raw: &Value) -> Option<ProductRef> {
    let obj = raw.as_object()?;
    let id = parse_id(obj.get("product_id")).or_else(|| parse_id(obj.get("id")))?;

    Some(ProductRef {
        id,
        title: string_field(obj, "title"),
        brand: string_field(obj, "brand"),
        price: price_field(obj.get("price")),
        image_url: string_field(obj, "image_url"),
        rank: obj.get("rank").and_then(Value::as_i64),
    })
}

fn parse_id(value: Option<&Value>) -> Option<ProductId> {
    match value? {
        Value::Number(n) => Some(ProductId::new(number_id(n))),
        Value::String(s) if !s.trim().is_empty() => Some(ProductId::new(s.trim())),
        _ => None,
    }
}

/// Spell a numeric id the way an integer id would be spelled, so `2.0`
/// and `2` name the same product.
fn number_id(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn price_field(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// HTTP transport
// =============================================================================

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
}

/// [`SearchService`] over the backend's JSON HTTP API.
#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    client: reqwest::Client,
    config: SearchConfig,
}

impl HttpSearchClient {
    pub fn new(config: SearchConfig) -> Result<Self, ChatError> {
        let client = build_client(&config)?;
        Ok(Self { client, config })
    }

    /// Check that the backend is reachable and healthy.
    pub async fn health(&self) -> Result<(), ChatError> {
        let url = self.config.endpoint("health");
        let response = self.client.get(&url).send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ChatError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl SearchService for HttpSearchClient {
    async fn search(&self, query: &str, limit: usize) -> Result<SearchResponse, ChatError> {
        let url = self.config.endpoint("search");
        debug!(url = %url, limit, "Sending search request");

        let body = fetch_json(
            self.client.post(&url).json(&SearchRequest { query, limit }),
        )
        .await?;
        SearchResponse::from_value(&body)
    }
}

pub(crate) fn build_client(config: &SearchConfig) -> Result<reqwest::Client, ChatError> {
    config.validate()?;
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| ChatError::Transport(format!("failed to build HTTP client: {}", e)))
}

/// Send a request and decode a JSON body, classifying every failure.
pub(crate) async fn fetch_json(request: reqwest::RequestBuilder) -> Result<Value, ChatError> {
    let response = request.send().await.map_err(transport_error)?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ChatError::Transport(format!("failed to read response: {}", e)))?;

    if !status.is_success() {
        return Err(ChatError::Status {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| ChatError::Decode(format!("invalid JSON body: {}", e)))
}

fn transport_error(err: reqwest::Error) -> ChatError {
    if err.is_timeout() {
        ChatError::Transport(format!("request timeout: {}", err))
    } else if err.is_connect() {
        ChatError::Transport(format!("connection failed: {}", err))
    } else {
        ChatError::Transport(format!("request failed: {}", err))
    }
}
