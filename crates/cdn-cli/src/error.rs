//! Error types and their HTTP responses

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cdn_core::GatewayError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// File operation a request was performing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Update,
    Delete,
    Fetch,
}

impl Operation {
    /// Verb used in client-facing messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Fetch => "fetch",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON body for messages and errors
#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    /// Multipart body without a `file` field
    #[error("File with key 'file' not found.")]
    MissingFile,

    /// Request is not a usable multipart form
    #[error("Invalid multipart request: {}", .0.body_text())]
    InvalidMultipart(#[from] MultipartRejection),

    /// Multipart body could not be parsed
    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),

    /// Gateway operation failed
    #[error("{operation} failed: {source}")]
    Gateway {
        operation: Operation,
        #[source]
        source: GatewayError,
    },
}

impl ApiError {
    /// Wrap a gateway error with the operation it interrupted
    pub fn gateway(operation: Operation, source: GatewayError) -> Self {
        Self::Gateway { operation, source }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingFile => StatusCode::BAD_REQUEST,
            Self::InvalidMultipart(e) => e.status(),
            Self::Multipart(e) => e.status(),
            Self::Gateway { source, .. } if source.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Gateway { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message returned to the client. Backend details stay in the logs.
    pub fn message(&self) -> String {
        match self {
            Self::MissingFile | Self::InvalidMultipart(_) | Self::Multipart(_) => {
                self.to_string()
            }
            Self::Gateway { source, .. } => match source {
                GatewayError::NotFound(_) => "Given key does not exist in bucket.".to_string(),
                GatewayError::InvalidKey(reason) => format!("Invalid key: {}.", reason),
                GatewayError::Backend(_) => format!("Failed to {} file.", self.operation_str()),
            },
        }
    }

    fn operation_str(&self) -> &'static str {
        match self {
            Self::Gateway { operation, .. } => operation.as_str(),
            _ => "process",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }

        (status, Json(MessageBody::new(self.message()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdn_store::StoreError;
    use rstest::rstest;

    fn backend() -> GatewayError {
        GatewayError::Backend(StoreError::backend("put_object", "connection reset"))
    }

    #[rstest]
    #[case(Operation::Upload, "Failed to upload file.")]
    #[case(Operation::Update, "Failed to update file.")]
    #[case(Operation::Delete, "Failed to delete file.")]
    #[case(Operation::Fetch, "Failed to fetch file.")]
    fn test_backend_failure_message(#[case] operation: Operation, #[case] expected: &str) {
        let error = ApiError::gateway(operation, backend());
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.message(), expected);
    }

    #[test]
    fn test_missing_file() {
        let error = ApiError::MissingFile;
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.message(), "File with key 'file' not found.");
    }

    #[test]
    fn test_client_errors_are_bad_request() {
        let not_found =
            ApiError::gateway(Operation::Update, GatewayError::NotFound("a.txt".to_string()));
        assert_eq!(not_found.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(not_found.message(), "Given key does not exist in bucket.");

        let invalid = ApiError::gateway(
            Operation::Upload,
            GatewayError::InvalidKey("key cannot be empty".to_string()),
        );
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.message(), "Invalid key: key cannot be empty.");
    }
}
