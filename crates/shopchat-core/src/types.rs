use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of a message in the conversation log.
///
/// Ordered: a larger id was appended later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a product as spelled by the remote service.
///
/// The service may send numbers or strings; both are kept as text so the
/// original spelling survives a round trip to the UI.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Integer value used for deterministic tie-breaking. Non-numeric ids map to 0.
    pub fn numeric_key(&self) -> i64 {
        self.0.trim().parse::<i64>().unwrap_or(0)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ProductId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<i32> for ProductId {
    fn from(id: i32) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for ProductId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// =============================================================================
// Products
// =============================================================================

/// A candidate product attached to a bot message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: ProductId,
    pub title: String,
    pub brand: String,
    pub price: f64,
    pub image_url: String,
    /// Relevance position assigned by the search service. Tie-break only.
    pub rank: Option<i64>,
}

impl ProductRef {
    /// Build a product with only the fields the ordering logic reads.
    pub fn new(id: impl Into<ProductId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            brand: String::new(),
            price: 0.0,
            image_url: String::new(),
            rank: None,
        }
    }

    pub fn with_rank(mut self, rank: i64) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = brand.into();
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
}

/// One entry of the conversation log. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    sender: Sender,
    text: String,
    products: Vec<ProductRef>,
    primary_product_id: Option<ProductId>,
    created_at: DateTime<Utc>,
}

impl Message {
    /// A user message. User messages never carry products.
    pub fn user(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            sender: Sender::User,
            text: text.into(),
            products: Vec::new(),
            primary_product_id: None,
            created_at: Utc::now(),
        }
    }

    /// A bot message with no product attachments.
    pub fn bot(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            sender: Sender::Bot,
            text: text.into(),
            products: Vec::new(),
            primary_product_id: None,
            created_at: Utc::now(),
        }
    }

    /// A bot reply carrying already-ranked products.
    pub fn bot_with_products(
        id: MessageId,
        text: impl Into<String>,
        products: Vec<ProductRef>,
        primary_product_id: Option<ProductId>,
    ) -> Self {
        Self {
            products,
            primary_product_id,
            ..Self::bot(id, text)
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn products(&self) -> &[ProductRef] {
        &self.products
    }

    pub fn primary_product_id(&self) -> Option<&ProductId> {
        self.primary_product_id.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
