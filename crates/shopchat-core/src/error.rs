use thiserror::Error;

/// Top-level error type shared by the shopchat crates.
///
/// Feature crates define their own error enums and wrap this one, so that
/// `?` works when they call into configuration or serialization helpers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ShopchatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ShopchatError {
    fn from(err: toml::de::Error) -> Self {
        ShopchatError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ShopchatError {
    fn from(err: toml::ser::Error) -> Self {
        ShopchatError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ShopchatError {
    fn from(err: serde_json::Error) -> Self {
        ShopchatError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for shopchat core operations.
pub type Result<T> = std::result::Result<T, ShopchatError>;
