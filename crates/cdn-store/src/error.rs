//! Error types for the cdn-store crate

use thiserror::Error;

/// Result type alias using `StoreError`
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while talking to the object store or the edge
#[derive(Error, Debug)]
pub enum StoreError {
    /// Object not found
    #[error("object not found: {0}")]
    NotFound(String),

    /// A backend API call failed
    #[error("{operation} failed: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },

    /// The edge answered a fetch with a non-success status
    #[error("edge returned status {status} for {key}")]
    UnexpectedStatus { key: String, status: u16 },

    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// HTTP error
    #[error("http error: {0}")]
    Http(String),

    /// IO error, typically from an upload body
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl StoreError {
    /// Wrap an SDK error for the given operation
    pub fn backend(operation: &'static str, err: impl std::fmt::Display) -> Self {
        StoreError::Backend {
            operation,
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Http(err.to_string())
        }
    }
}
