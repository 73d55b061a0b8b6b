//! Infrastructure errors raised by the store and cache collaborators.

use thiserror::Error;

/// Result type alias for store and cache calls.
pub type Result<T> = std::result::Result<T, SubstrateError>;

/// Failure of a persistence or cache substrate.
///
/// The coordinator never propagates these: it logs them and degrades.
#[derive(Debug, Error)]
pub enum SubstrateError {
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SubstrateError {
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache(message.into())
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }
}
