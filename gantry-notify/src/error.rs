//! Error types for notification and artifact sinks

use thiserror::Error;

/// Result type alias for sink operations
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Errors that can occur while publishing to external services
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("unexpected status {status} from {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    /// Message template could not be rendered
    #[error("template error: {0}")]
    Template(String),

    /// Artifact file could not be read
    #[error("artifact read failed: {0}")]
    Io(#[from] std::io::Error),
}
