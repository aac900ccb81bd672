//! Time-to-live response cache.
//!
//! The cache is TTL-agnostic: every `set` carries its own TTL, chosen by the
//! caller per endpoint (pair lists for minutes, tickers for seconds). An
//! entry is a miss once `now - stored_at > ttl` and is evicted lazily on the
//! read that discovers it expired.
//!
//! Time is read from `tokio::time::Instant` so paused-clock tests can step
//! through expiry deterministically.

use std::time::Duration;

use ahash::AHashMap;
use parking_lot::Mutex;
use tokio::time::Instant;

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

/// Keyed TTL cache, safe to share behind an `Arc`.
pub struct ResponseCache<V = serde_json::Value> {
    entries: Mutex<AHashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(AHashMap::new()),
        }
    }

    /// Return the cached value if present and still within its TTL.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
            ttl,
        };
        self.entries.lock().insert(key.into(), entry);
    }

    pub fn delete(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
