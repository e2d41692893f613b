//! Runtime selection between AWS and in-memory backends

use crate::{
    ByteStream, CachedObject, CloudFrontEdgeCache, EdgeCache, MemoryEdgeCache, MemoryObjectStore,
    ObjectStore, Result, S3ObjectStore,
};
use async_trait::async_trait;

/// Object store chosen at startup
#[derive(Clone)]
pub enum FlexibleObjectStore {
    /// S3 bucket
    S3(S3ObjectStore),
    /// In-memory storage (development only)
    Memory(MemoryObjectStore),
}

impl FlexibleObjectStore {
    /// Check if using S3 or the memory fallback
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::S3(_))
    }
}

#[async_trait]
impl ObjectStore for FlexibleObjectStore {
    async fn exists(&self, key: &str) -> bool {
        match self {
            Self::S3(store) => store.exists(key).await,
            Self::Memory(store) => store.exists(key).await,
        }
    }

    async fn put(
        &self,
        key: &str,
        content_type: &str,
        content_disposition: &str,
        body: ByteStream<'_>,
    ) -> Result<()> {
        match self {
            Self::S3(store) => store.put(key, content_type, content_disposition, body).await,
            Self::Memory(store) => store.put(key, content_type, content_disposition, body).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Self::S3(store) => store.delete(key).await,
            Self::Memory(store) => store.delete(key).await,
        }
    }
}

/// Edge cache chosen at startup
#[derive(Clone)]
pub enum FlexibleEdgeCache {
    /// CloudFront distribution
    CloudFront(CloudFrontEdgeCache),
    /// In-memory edge reading through a memory store
    Memory(MemoryEdgeCache),
}

#[async_trait]
impl EdgeCache for FlexibleEdgeCache {
    async fn fetch(&self, key: &str) -> Result<CachedObject> {
        match self {
            Self::CloudFront(edge) => edge.fetch(key).await,
            Self::Memory(edge) => edge.fetch(key).await,
        }
    }

    async fn invalidate(&self, path: &str, caller_reference: &str) -> Result<()> {
        match self {
            Self::CloudFront(edge) => edge.invalidate(path, caller_reference).await,
            Self::Memory(edge) => edge.invalidate(path, caller_reference).await,
        }
    }
}
