//! Error types for run submission

use graph_engine::GraphError;
use thiserror::Error;

/// Result type alias using RunError
pub type Result<T> = std::result::Result<T, RunError>;

#[derive(Debug, Error)]
pub enum RunError {
    /// Pre-flight guard refused the graph; nothing was sent
    #[error("{0}")]
    ValidationFailed(String),

    /// Network failure talking to the execution service
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The execution service answered with a non-success status
    #[error("Run failed ({status}): {detail}")]
    Service { status: u16, detail: String },

    /// A success response did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Building or reading a graph document failed
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RunError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::ValidationFailed(reason.into())
    }
}
