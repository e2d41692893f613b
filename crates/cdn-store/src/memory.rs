//! In-memory object store and edge cache for development and testing

use crate::{ByteStream, CachedObject, EdgeCache, ObjectStore, Result, StoreError};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use futures::StreamExt;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Default number of entries the memory edge keeps cached
pub const DEFAULT_EDGE_CAPACITY: usize = 1024;

/// An object held by the memory store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    /// Object bytes
    pub data: Bytes,
    /// Content type recorded at put time
    pub content_type: String,
    /// Content disposition recorded at put time
    pub content_disposition: String,
}

/// An in-memory object store
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<DashMap<String, StoredObject>>,
    puts: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryObjectStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a stored object
    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.get(key).map(|entry| entry.value().clone())
    }

    /// Insert an object directly, bypassing the put counter
    pub fn insert(&self, key: impl Into<String>, object: StoredObject) {
        self.objects.insert(key.into(), object);
    }

    /// Get the number of objects stored
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of put calls received, including failed ones
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Number of delete calls received, including failed ones
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Make every subsequent put and delete fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self, operation: &'static str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::backend(operation, "memory store is failing writes"));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn exists(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    async fn put(
        &self,
        key: &str,
        content_type: &str,
        content_disposition: &str,
        mut body: ByteStream<'_>,
    ) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.check_writable("put")?;

        let mut data = BytesMut::new();
        while let Some(chunk) = body.next().await {
            data.extend_from_slice(&chunk?);
        }

        self.objects.insert(
            key.to_string(),
            StoredObject {
                data: data.freeze(),
                content_type: content_type.to_string(),
                content_disposition: content_disposition.to_string(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_writable("delete")?;
        self.objects.remove(key);
        Ok(())
    }
}

/// An invalidation received by the memory edge
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidationRecord {
    /// Invalidated path
    pub path: String,
    /// Caller reference sent with the invalidation
    pub caller_reference: String,
}

/// In-memory edge cache reading through a [`MemoryObjectStore`].
///
/// Fetched objects stay cached until their path is invalidated, so a write
/// that skips invalidation is visible as a stale read.
#[derive(Clone)]
pub struct MemoryEdgeCache {
    origin: MemoryObjectStore,
    cache: Arc<Mutex<lru::LruCache<String, StoredObject>>>,
    invalidations: Arc<Mutex<Vec<InvalidationRecord>>>,
    fail_fetches: Arc<AtomicBool>,
    fail_invalidations: Arc<AtomicBool>,
}

impl MemoryEdgeCache {
    /// Create an edge in front of `origin` with the default capacity
    pub fn new(origin: MemoryObjectStore) -> Self {
        Self::with_capacity(origin, DEFAULT_EDGE_CAPACITY)
    }

    /// Create an edge in front of `origin` caching at most `capacity` entries
    pub fn with_capacity(origin: MemoryObjectStore, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            origin,
            cache: Arc::new(Mutex::new(lru::LruCache::new(capacity))),
            invalidations: Arc::new(Mutex::new(Vec::new())),
            fail_fetches: Arc::new(AtomicBool::new(false)),
            fail_invalidations: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Invalidations received so far, oldest first
    pub fn invalidations(&self) -> Vec<InvalidationRecord> {
        self.invalidations.lock().clone()
    }

    /// Check whether the edge currently holds a cached copy of `key`
    pub fn is_cached(&self, key: &str) -> bool {
        self.cache.lock().contains(key)
    }

    /// Make every subsequent fetch fail as if the edge answered 502
    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent invalidation fail. Failed invalidations are
    /// still recorded but leave the cache untouched.
    pub fn set_fail_invalidations(&self, fail: bool) {
        self.fail_invalidations.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EdgeCache for MemoryEdgeCache {
    async fn fetch(&self, key: &str) -> Result<CachedObject> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(StoreError::UnexpectedStatus {
                key: key.to_string(),
                status: 502,
            });
        }

        let cached = self.cache.lock().get(key).cloned();
        let object = match cached {
            Some(object) => object,
            None => {
                let object = self.origin.get(key).ok_or_else(|| StoreError::UnexpectedStatus {
                    key: key.to_string(),
                    status: 404,
                })?;
                self.cache.lock().put(key.to_string(), object.clone());
                object
            }
        };

        let StoredObject {
            data, content_type, ..
        } = object;
        let content_length = Some(data.len() as u64);
        Ok(CachedObject {
            body: futures::stream::once(async move { Ok::<_, std::io::Error>(data) }).boxed(),
            content_length,
            content_type,
        })
    }

    async fn invalidate(&self, path: &str, caller_reference: &str) -> Result<()> {
        self.invalidations.lock().push(InvalidationRecord {
            path: path.to_string(),
            caller_reference: caller_reference.to_string(),
        });

        if self.fail_invalidations.load(Ordering::SeqCst) {
            return Err(StoreError::backend(
                "invalidate",
                "memory edge is failing invalidations",
            ));
        }

        let key = path.strip_prefix('/').unwrap_or(path);
        self.cache.lock().pop(key);
        Ok(())
    }
}
