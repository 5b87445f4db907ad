//! Decoded value caches
//!
//! The decoder treats a cache as an opaque get/set capability keyed by
//! absolute buffer offset. Entries carry no buffer identity: one cache
//! belongs to one buffer and one pointer base. Sharing it between databases,
//! or between decoders with different pointer bases, returns wrong values.

use crate::decoder::DataValue;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

/// Offset-keyed store for decoded values
///
/// Implementations must be shareable across threads since a single reader
/// serves concurrent lookups.
pub trait ValueCache: Send + Sync {
    /// Previously stored value for `offset`, if any
    fn get(&self, offset: usize) -> Option<DataValue>;

    /// Store the value decoded at `offset`
    fn set(&self, offset: usize, value: &DataValue);
}

/// Cache that never stores anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl ValueCache for NoCache {
    fn get(&self, _offset: usize) -> Option<DataValue> {
        None
    }

    fn set(&self, _offset: usize, _value: &DataValue) {}
}

/// Bounded least-recently-used cache, safe to share between threads
#[derive(Debug)]
pub struct LruValueCache {
    inner: Mutex<LruCache<usize, DataValue>>,
}

impl LruValueCache {
    /// Create a cache holding at most `capacity` values (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of cached values
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Maximum number of cached values
    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    /// Drop every cached value
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<usize, DataValue>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ValueCache for LruValueCache {
    fn get(&self, offset: usize) -> Option<DataValue> {
        self.lock().get(&offset).cloned()
    }

    fn set(&self, offset: usize, value: &DataValue) {
        self.lock().put(offset, value.clone());
    }
}
