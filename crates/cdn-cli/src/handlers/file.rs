//! File handlers (upload, update, delete, fetch)

use crate::error::{MessageBody, Operation};
use crate::{ApiError, AppState};
use axum::{
    body::Body,
    extract::{
        multipart::{Multipart, MultipartRejection},
        Path, State,
    },
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use cdn_core::OCTET_STREAM;
use cdn_store::ByteStream;
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;

/// Multipart field holding the file
pub const FILE_FIELD: &str = "file";

/// POST / - Upload a new file under its filename
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart = multipart?;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let key = field.file_name().unwrap_or_default().to_string();
        let body: ByteStream<'_> = field.map_err(std::io::Error::other).boxed();
        state
            .gateway
            .create(&key, body)
            .await
            .map_err(|e| ApiError::gateway(Operation::Upload, e))?;

        return Ok((
            StatusCode::CREATED,
            Json(MessageBody::new("File uploaded successfully.")),
        )
            .into_response());
    }

    Err(ApiError::MissingFile)
}

/// PUT /{key} - Replace an existing file
pub async fn update_file(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart = multipart?;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let body: ByteStream<'_> = field.map_err(std::io::Error::other).boxed();
        state
            .gateway
            .replace(&key, body)
            .await
            .map_err(|e| ApiError::gateway(Operation::Update, e))?;

        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    Err(ApiError::MissingFile)
}

/// DELETE /{key} - Delete a file
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    state
        .gateway
        .delete(&key)
        .await
        .map_err(|e| ApiError::gateway(Operation::Delete, e))?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// GET /{key} - Stream a file from the edge
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let file = state
        .gateway
        .read(&key)
        .await
        .map_err(|e| ApiError::gateway(Operation::Fetch, e))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(&file.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(OCTET_STREAM)),
    );
    if let Some(length) = file.content_length {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    }
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_static(file.content_disposition()),
    );

    Ok((StatusCode::OK, headers, Body::from_stream(file.body)).into_response())
}
