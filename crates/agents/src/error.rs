//! Agent error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Storage error: {0}")]
    Storage(#[from] budget_rag_storage::StorageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An error reported by a managed service, keyed by the service's
    /// error type (e.g. `ResourceNotFoundException`)
    #[error("{error_type}: {message}")]
    Service { error_type: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
