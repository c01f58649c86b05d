//! Error types for chatrelay.

use thiserror::Error;

use crate::provider::ProviderError;

/// Common error type for chatrelay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for configuration or user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wire protocol violation (e.g. connection closed before the name handshake).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Completion provider error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Result type alias for chatrelay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
