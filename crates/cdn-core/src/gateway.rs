//! File operations over the object store and the edge cache

use crate::sniff::{ContentSniffer, OCTET_STREAM};
use crate::token::next_invalidation_token;
use crate::{GatewayError, Key, Result};
use cdn_store::{ByteStream, EdgeCache, ObjectStore, INLINE_DISPOSITION};
use tracing::{error, info, instrument, warn};

/// What happened to the edge after a write
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Invalidation {
    /// The write could not have left a stale edge entry
    NotRequired,
    /// The edge accepted the invalidation
    Submitted { path: String, token: String },
    /// The edge rejected or never received the invalidation; cached copies
    /// may be served until they expire or the next write invalidates them
    Failed {
        path: String,
        token: String,
        reason: String,
    },
}

impl Invalidation {
    /// Whether the invalidation attempt failed
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Result of a successful create, replace or delete
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Key written or deleted
    pub key: Key,
    /// Content type stored with the bytes; `None` for deletes
    pub content_type: Option<&'static str>,
    /// Edge invalidation status
    pub invalidation: Invalidation,
}

/// A file served through the edge
pub struct FileDownload {
    /// Body streamed from the edge
    pub body: ByteStream<'static>,
    /// Body length, when the edge reported one
    pub content_length: Option<u64>,
    /// Content type, never empty
    pub content_type: String,
}

impl FileDownload {
    /// Disposition every download is served with
    pub fn content_disposition(&self) -> &'static str {
        INLINE_DISPOSITION
    }
}

impl std::fmt::Debug for FileDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDownload")
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Coordinates the object store and the edge cache.
///
/// Holds no per-request state; share it behind an `Arc`.
pub struct FileGateway<S, C> {
    store: S,
    edge: C,
}

impl<S: ObjectStore, C: EdgeCache> FileGateway<S, C> {
    /// Create a gateway over the given backends
    pub fn new(store: S, edge: C) -> Self {
        Self { store, edge }
    }

    /// Object store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Edge cache
    pub fn edge(&self) -> &C {
        &self.edge
    }

    /// Store a new file. A fresh key has nothing cached, so the edge is not
    /// touched.
    #[instrument(skip(self, body))]
    pub async fn create(&self, key: &str, body: ByteStream<'_>) -> Result<WriteOutcome> {
        let key = Key::new(key)?;
        let content_type = self.put(&key, body).await?;

        info!(key = %key, content_type, "File uploaded");
        Ok(WriteOutcome {
            key,
            content_type: Some(content_type),
            invalidation: Invalidation::NotRequired,
        })
    }

    /// Overwrite an existing file, then invalidate its edge path.
    ///
    /// Fails with [`GatewayError::NotFound`] before reading `body` if the key
    /// is absent.
    #[instrument(skip(self, body))]
    pub async fn replace(&self, key: &str, body: ByteStream<'_>) -> Result<WriteOutcome> {
        let key = Key::new(key)?;
        if !self.store.exists(key.as_str()).await {
            warn!(key = %key, "Key does not exist in object store");
            return Err(GatewayError::NotFound(key.to_string()));
        }

        let content_type = self.put(&key, body).await?;
        info!(key = %key, content_type, "File updated");

        let invalidation = self.invalidate(&key).await;
        Ok(WriteOutcome {
            key,
            content_type: Some(content_type),
            invalidation,
        })
    }

    /// Delete a file, then invalidate its edge path. Missing keys are left to
    /// the object store's delete semantics.
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<WriteOutcome> {
        let key = Key::new(key)?;
        self.store.delete(key.as_str()).await.map_err(|e| {
            error!(key = %key, error = %e, "Failed to delete file");
            e
        })?;

        let invalidation = self.invalidate(&key).await;
        info!(key = %key, "File deleted");
        Ok(WriteOutcome {
            key,
            content_type: None,
            invalidation,
        })
    }

    /// Fetch a file through the edge. There is no direct object-store
    /// fallback: the edge reads through on a miss.
    #[instrument(skip(self))]
    pub async fn read(&self, key: &str) -> Result<FileDownload> {
        let key = Key::new(key)?;
        let object = self.edge.fetch(key.as_str()).await.map_err(|e| {
            error!(key = %key, error = %e, "Failed to fetch file");
            e
        })?;

        let content_type = if object.content_type.is_empty() {
            OCTET_STREAM.to_string()
        } else {
            object.content_type
        };

        info!(key = %key, "File fetched");
        Ok(FileDownload {
            body: object.body,
            content_length: object.content_length,
            content_type,
        })
    }

    async fn put(&self, key: &Key, body: ByteStream<'_>) -> Result<&'static str> {
        let sniffed = ContentSniffer::sniff(body).await;
        self.store
            .put(
                key.as_str(),
                sniffed.content_type,
                INLINE_DISPOSITION,
                sniffed.body,
            )
            .await
            .map_err(|e| {
                error!(key = %key, error = %e, "Failed to store file");
                e
            })?;
        Ok(sniffed.content_type)
    }

    async fn invalidate(&self, key: &Key) -> Invalidation {
        let path = key.edge_path();
        let token = next_invalidation_token();

        match self.edge.invalidate(&path, &token).await {
            Ok(()) => Invalidation::Submitted { path, token },
            Err(e) => {
                error!(path = %path, error = %e, "Failed to create invalidation");
                Invalidation::Failed {
                    path,
                    token,
                    reason: e.to_string(),
                }
            }
        }
    }
}
