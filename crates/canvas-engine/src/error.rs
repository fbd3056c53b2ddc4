//! Error types for the canvas engine

use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur in the canvas engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Node does not exist on the board
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Edge does not exist on the board
    #[error("Edge not found: {0}")]
    EdgeNotFound(String),

    /// Node type is not known to the registry
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// A node with this id is already on the board
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    /// Connection was rejected by the validator
    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    /// An execution precondition was not met (e.g. a missing upstream image)
    #[error("{0}")]
    Precondition(String),

    /// Execution failed
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// The generation provider rejected or failed the request
    #[error("Provider error: {0}")]
    Provider(String),

    /// A persistence call failed
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or saved
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Create an execution failed error with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Create a precondition error with a message
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a provider error with a message
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }
}

/// Errors returned by a board persistence backend
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    /// The entity does not exist in this store (404-class)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend could not be reached or returned a transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend rejected the request
    #[error("Rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response could not be decoded
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl PersistenceError {
    /// Whether this error should trigger a legacy-endpoint fallback
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
