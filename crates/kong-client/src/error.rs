//! Kong client errors

use thiserror::Error;

/// Errors that can occur when interacting with the Kong admin API
#[derive(Debug, Error)]
pub enum KongError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Kong admin API answered with an unexpected status
    #[error("Kong API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The requested Kong object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., missing required fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl KongError {
    /// Whether this error means the addressed object does not exist.
    ///
    /// Only the explicit `NotFound` variant counts; other 4xx answers are not
    /// folded into it.
    pub fn is_not_found(&self) -> bool {
        matches!(self, KongError::NotFound(_))
    }
}
