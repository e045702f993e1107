//! Bounded LRU response store.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::RwLock;

use crate::cache::CacheKey;
use crate::http::message::HttpResponse;
use crate::observability::metrics;

/// A thread-safe, fixed-capacity response cache with least-recently-used
/// eviction.
///
/// All state lives in one [`LruCache`] behind a readers-writer lock. Lookups
/// that do not touch recency (`contains`, `len`) share the read lock. `get`
/// promotes the entry, so it takes the write lock like `put` and `update`.
/// Each public operation acquires the lock exactly once, which makes every
/// check-and-mutate step atomic.
pub struct ResponseCache {
    inner: RwLock<LruCache<CacheKey, HttpResponse>>,
}

impl ResponseCache {
    /// Create a cache holding at most `capacity` responses.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Whether `key` is cached. Does not change recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.read().contains(key)
    }

    /// Return a snapshot of the cached response and mark it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<HttpResponse> {
        self.inner.write().get(key).cloned()
    }

    /// Insert `response` under `key` unless the key is already cached.
    ///
    /// A full cache evicts its least recently used entry first. Returns
    /// whether the response was inserted.
    pub fn put(&self, key: CacheKey, response: HttpResponse) -> bool {
        let mut inner = self.inner.write();
        if inner.contains(&key) {
            return false;
        }
        if inner.len() == inner.cap().get() {
            Self::evict(&mut inner);
        }
        inner.put(key, response);
        metrics::record_cache_size(inner.len());
        true
    }

    /// Replace the response stored under `key` without changing its recency.
    /// Returns false if the key is not cached.
    pub fn update(&self, key: &CacheKey, response: HttpResponse) -> bool {
        match self.inner.write().peek_mut(key) {
            Some(slot) => {
                *slot = response;
                true
            }
            None => false,
        }
    }

    /// Number of cached responses.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of cached responses.
    pub fn capacity(&self) -> usize {
        self.inner.read().cap().get()
    }

    fn evict(inner: &mut LruCache<CacheKey, HttpResponse>) {
        if let Some((key, _)) = inner.pop_lru() {
            tracing::info!(parent: None, key = %key, "evicted from cache");
            metrics::record_cache_eviction();
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("ResponseCache")
            .field("len", &inner.len())
            .field("capacity", &inner.cap())
            .finish()
    }
}
