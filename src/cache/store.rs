//! TTL cache for decoded read responses.

use crate::cache::CacheStats;
use crate::key::RequestKey;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Entry in the response cache.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Decoded payload, shared cheaply with callers
    data: Arc<Value>,
    /// When the entry was stored
    stored_at: Instant,
    /// Validity window
    ttl: Duration,
}

impl CacheEntry {
    fn new(data: Arc<Value>, ttl: Duration) -> Self {
        Self {
            data,
            stored_at: Instant::now(),
            ttl,
        }
    }

    /// An entry is valid iff less than its TTL has elapsed since storage.
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }
}

/// Cache table for idempotent read responses.
///
/// Entries are created on successful read responses and evicted lazily:
/// a lookup that finds an expired entry deletes it and reports a miss.
/// There is no proactive sweep.
pub struct ResponseCache {
    entries: Mutex<HashMap<RequestKey, CacheEntry>>,
    stats: Mutex<CacheStats>,
}

impl ResponseCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::new()),
        }
    }

    /// Get a cached response.
    ///
    /// Returns `Some(data)` iff an entry exists and is within its validity
    /// window. An expired entry is deleted as a side effect of the lookup.
    /// Absent entries have no side effect beyond the miss statistic.
    pub fn get(&self, key: &RequestKey) -> Option<Arc<Value>> {
        let mut entries = self.entries.lock().unwrap();
        let mut stats = self.stats.lock().unwrap();

        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                stats.record_eviction();
                stats.record_miss();
                debug!(key = %key, "evicted expired cache entry");
                None
            }
            Some(entry) => {
                stats.record_hit();
                Some(Arc::clone(&entry.data))
            }
            None => {
                stats.record_miss();
                None
            }
        }
    }

    /// Store a response, unconditionally overwriting any existing entry
    /// for the key with a fresh timestamp.
    pub fn insert(&self, key: RequestKey, data: Arc<Value>, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key, CacheEntry::new(data, ttl));
    }

    /// Remove one entry. Has no effect on in-flight transfers.
    pub fn remove(&self, key: &RequestKey) {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key);
    }

    /// Empty the entire cache. Has no effect on in-flight transfers.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap();
        entries.clear();
    }

    /// Get the current number of entries, expired ones included.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap();
        entries.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        let stats = self.stats.lock().unwrap();
        stats.clone()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}
