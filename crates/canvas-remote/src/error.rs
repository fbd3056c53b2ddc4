//! Error types for the HTTP clients

use canvas_engine::{EngineError, PersistenceError};
use thiserror::Error;

/// Result type alias using RemoteError
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Errors raised while talking to the canvas backend
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request never produced a response
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered 404
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend answered with another non-success status
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape
    #[error("Failed to parse response: {0}")]
    Decode(String),

    /// The base URL could not be used
    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),
}

impl From<RemoteError> for PersistenceError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound(what) => PersistenceError::NotFound(what),
            RemoteError::Status { status, body } => PersistenceError::Rejected {
                status,
                message: body,
            },
            RemoteError::Decode(msg) => PersistenceError::Malformed(msg),
            RemoteError::Http(e) => PersistenceError::Transport(e.to_string()),
            RemoteError::InvalidUrl(url) => PersistenceError::Transport(url),
        }
    }
}

impl From<RemoteError> for EngineError {
    fn from(err: RemoteError) -> Self {
        EngineError::provider(err.to_string())
    }
}
