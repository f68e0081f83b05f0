//! Error types for rowform-core

use thiserror::Error;

/// Result type alias using [`CoreError`]
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while building or converting core values
#[derive(Debug, Error)]
pub enum CoreError {
    /// Unknown output type name in a configuration
    #[error("Unknown output type: {0}")]
    UnknownOutputType(String),

    /// Invalid value type for a conversion
    #[error("Invalid value type: expected {expected}, got {actual}")]
    InvalidValueType {
        expected: &'static str,
        actual: &'static str,
    },

    /// Malformed JSON document
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        CoreError::Other(msg.into())
    }
}
