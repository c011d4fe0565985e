//! Core error types shared across the workspace.

use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed client input: identifier, unsupported series,
    /// invalid date range.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    /// The messaging gateway could not be reached within the bounded
    /// startup wait.
    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("xml rendering error: {0}")]
    Xml(String),
}

impl CoreError {
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        CoreError::BadRequest(message.into())
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        CoreError::Configuration(message.into())
    }
}
