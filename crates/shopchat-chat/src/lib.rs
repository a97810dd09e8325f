//! Conversation engine for the shopping assistant.
//!
//! Keeps the chat transcript, orders product cards by how the answer
//! mentions them, and renders answer text into paragraph and emphasis
//! blocks for a presentation layer.

pub mod catalog;
pub mod conversation;
pub mod error;
pub mod orchestrator;
pub mod ranker;
pub mod render;
pub mod search;

pub use catalog::{CatalogService, HttpCatalogClient};
pub use conversation::{
    current_primary, select_primary, Clock, Conversation, IdGenerator, ProductCard,
    RenderedMessage, SystemClock,
};
pub use error::ChatError;
pub use orchestrator::{PendingTurn, ShoppingAssistant, TurnState};
pub use ranker::{order_products, ProductRanker, SubstringMatcher, TitleMatcher};
pub use render::{render, render_value, ParagraphBlock, Span};
pub use search::{HttpSearchClient, SearchResponse, SearchService};
