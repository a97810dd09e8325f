pub mod config;
pub mod error;
pub mod types;

pub use config::ShopchatConfig;
pub use error::{Result, ShopchatError};
pub use types::*;
