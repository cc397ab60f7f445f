//! In-memory image bytes keyed by photo URL.

use bytes::Bytes;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Bounded LRU of downloaded images. Not persisted.
pub struct ImageCache {
    entries: Mutex<LruCache<String, Bytes>>,
}

impl ImageCache {
    /// `capacity` of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, LruCache<String, Bytes>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, url: &str) -> Option<Bytes> {
        self.entries().get(url).cloned()
    }

    pub fn insert(&self, url: impl Into<String>, bytes: Bytes) {
        self.entries().put(url.into(), bytes);
    }

    pub fn remove(&self, url: &str) {
        self.entries().pop(url);
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
