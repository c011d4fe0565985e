//! Stream pipeline errors.

use thiserror::Error;

use gridlink_db::DbError;

#[derive(Debug, Error)]
pub enum StreamError {
    /// Decryption or unpacking failed after exhausting every
    /// configured key; the file goes to quarantine.
    #[error("corrupted file: {0}")]
    Corrupted(String),

    /// Unexpected structure in a stream payload; the whole file goes
    /// to quarantine, nothing is emitted.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Db(#[from] DbError),

    /// Delivery-side failure; the subscription reaches its FAILED
    /// terminal state and is retried on the next run.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl StreamError {
    pub fn corrupted<S: Into<String>>(message: S) -> Self {
        StreamError::Corrupted(message.into())
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        StreamError::Parse(message.into())
    }
}
