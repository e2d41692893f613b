//! # CDN Store
//!
//! Backend layer for the CDN gateway: the durable object store that holds the
//! authoritative bytes, and the edge cache that serves reads.
//!
//! This crate provides:
//! - **ObjectStore**: existence check, put and delete against the store of record
//! - **EdgeCache**: streaming fetch through the edge and path invalidation
//! - **AWS backends**: S3 for objects, CloudFront for the edge
//! - **Memory backends**: in-process fakes for development and tests
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              File Gateway               │
//! ├────────────────────┬────────────────────┤
//! │  ObjectStore Trait │  EdgeCache Trait   │
//! ├─────────┬──────────┼──────────┬─────────┤
//! │   S3    │  Memory  │CloudFront│ Memory  │
//! └─────────┴──────────┴──────────┴─────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use cdn_store::{ObjectStore, S3ObjectStore, S3Config};
//!
//! let store = S3ObjectStore::new(S3Config::new("my-bucket")).await?;
//! store.put("logo.png", "image/png", "inline", body).await?;
//! ```

pub mod cloudfront;
pub mod error;
pub mod flexible;
pub mod memory;
pub mod s3;

pub use cloudfront::{CloudFrontConfig, CloudFrontEdgeCache};
pub use error::{Result, StoreError};
pub use flexible::{FlexibleEdgeCache, FlexibleObjectStore};
pub use memory::{InvalidationRecord, MemoryEdgeCache, MemoryObjectStore, StoredObject};
pub use s3::{S3Config, S3ObjectStore};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Content disposition attached to every stored object
pub const INLINE_DISPOSITION: &str = "inline";

/// A boxed stream of byte chunks flowing into or out of a backend
pub type ByteStream<'a> = BoxStream<'a, std::io::Result<Bytes>>;

/// Durable key/bytes store holding the authoritative copy of every file
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check whether an object exists.
    ///
    /// Backend failures are reported as `false`; callers cannot tell an
    /// unreachable store from a missing key.
    async fn exists(&self, key: &str) -> bool;

    /// Store `body` under `key`, overwriting any previous object
    async fn put(
        &self,
        key: &str,
        content_type: &str,
        content_disposition: &str,
        body: ByteStream<'_>,
    ) -> Result<()>;

    /// Delete an object. Deleting a missing key follows the backend's semantics.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Read-through cache in front of the object store
#[async_trait]
pub trait EdgeCache: Send + Sync {
    /// Fetch an object through the edge as a stream
    async fn fetch(&self, key: &str) -> Result<CachedObject>;

    /// Ask the edge to drop cached responses for `path`.
    ///
    /// `caller_reference` must be unique per call; the edge deduplicates
    /// invalidation batches by it.
    async fn invalidate(&self, path: &str, caller_reference: &str) -> Result<()>;
}

/// An object served by the edge
pub struct CachedObject {
    /// Response body, streamed from the edge
    pub body: ByteStream<'static>,
    /// Body length in bytes, when the edge reported one
    pub content_length: Option<u64>,
    /// Content type reported by the edge; may be empty
    pub content_type: String,
}

impl std::fmt::Debug for CachedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedObject")
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}
