//! Error types for tickflow-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid volume: {0}")]
    InvalidVolume(String),

    #[error("Missing symbol")]
    MissingSymbol,
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
