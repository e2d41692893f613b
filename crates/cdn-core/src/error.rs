//! Error types for the cdn-core crate

use thiserror::Error;

/// Result type alias using `GatewayError`
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors returned by gateway operations.
///
/// Invalidation failures never appear here; they are carried on the
/// successful [`WriteOutcome`](crate::WriteOutcome).
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Replace targeted a key absent from the object store
    #[error("key not found: {0}")]
    NotFound(String),

    /// Key is empty or too long
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Object store or edge failure
    #[error("backend failure: {0}")]
    Backend(#[from] cdn_store::StoreError),
}

impl GatewayError {
    /// Whether the caller is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidKey(_))
    }
}
