//! Error types for the shopping chat engine.

use shopchat_core::{MessageId, ShopchatError};

/// Errors from the chat engine and its remote collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("a turn is already in flight")]
    TurnInFlight,
    #[error("message id {attempted} is not greater than last id {last}")]
    NonMonotonicId {
        last: MessageId,
        attempted: MessageId,
    },
    #[error("user messages cannot carry products")]
    ProductsOnUserMessage,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("search service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    Core(#[from] ShopchatError),
}

impl ChatError {
    /// Whether the failure came from a remote collaborator rather than
    /// from local validation.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ChatError::Transport(_) | ChatError::Status { .. } | ChatError::Decode(_)
        )
    }
}
