//! In-process cache capability.
//!
//! Moka-backed string cache with per-entry TTL. Entries past their TTL are
//! treated as absent and evicted on the next read.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::sync::Cache;

/// Maximum cache capacity.
const MAX_CAPACITY: u64 = 10_000;

#[derive(Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Cache capability handed to features through the host.
#[derive(Clone)]
pub struct CacheService {
    inner: Arc<Cache<String, CacheEntry>>,
}

impl Default for CacheService {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheService {
    /// Create a new cache.
    pub fn new() -> Self {
        let inner = Cache::builder().max_capacity(MAX_CAPACITY).build();
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Get a value, honoring TTL.
    pub fn get(&self, key: &str) -> Option<String> {
        let entry = self.inner.get(key)?;
        if entry.is_expired() {
            self.inner.invalidate(key);
            return None;
        }
        Some(entry.value)
    }

    /// Set a value with an optional TTL.
    pub fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let entry = CacheEntry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.inner.insert(key.to_string(), entry);
    }

    /// Remove a single key.
    pub fn delete(&self, key: &str) {
        self.inner.invalidate(key);
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Whether a live (non-expired) value exists for the key.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete() {
        let cache = CacheService::new();
        cache.set("a", "1", None);

        assert_eq!(cache.get("a").as_deref(), Some("1"));
        assert!(cache.has("a"));

        cache.delete("a");
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn ttl_expires_entries() {
        let cache = CacheService::new();
        cache.set("short", "x", Some(Duration::from_millis(10)));

        assert!(cache.has("short"));
        std::thread::sleep(Duration::from_millis(25));
        assert!(!cache.has("short"));
        assert!(cache.get("short").is_none());
    }

    #[test]
    fn clear_drops_everything() {
        let cache = CacheService::new();
        cache.set("a", "1", None);
        cache.set("b", "2", None);

        cache.clear();
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_none());
    }
}
