//! In-process cache of generated replies, keyed by normalized prompt.

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

use crate::config::CacheConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub reply: String,
    pub complexity: String,
    pub created_at: DateTime<Utc>,
}

pub struct ResponseCache {
    entries: RwLock<LruCache<String, CacheEntry>>,
    ttl: Option<Duration>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            ttl: config.ttl_secs.map(|secs| Duration::seconds(secs as i64)),
        }
    }

    /// Stored reply for `key`, byte-for-byte as it was cached.
    pub fn get_cached_ai_response(&self, key: &str) -> Option<String> {
        // LruCache::get updates recency, so reads need the write lock
        let mut entries = self.entries.write();
        let entry = entries.get(key)?;
        if !self.is_expired(entry) {
            return Some(entry.reply.clone());
        }
        entries.pop(key);
        tracing::debug!(key = %key, "Cached reply expired");
        None
    }

    pub fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries
            .read()
            .peek(key)
            .filter(|entry| !self.is_expired(entry))
            .cloned()
    }

    pub fn cache_ai_response(&self, key: &str, reply: &str, complexity: &str) {
        let entry = CacheEntry {
            reply: reply.to_string(),
            complexity: complexity.to_string(),
            created_at: Utc::now(),
        };
        self.entries.write().put(key.to_string(), entry);
    }

    /// Drops every entry under one write lock and returns how many were held.
    pub fn clear_ai_response_cache(&self) -> usize {
        let mut entries = self.entries.write();
        let cleared = entries.len();
        entries.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.ttl
            .is_some_and(|ttl| Utc::now().signed_duration_since(entry.created_at) > ttl)
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_is_byte_identical() {
        let cache = ResponseCache::default();
        let reply = "DOrSU offers BS Agriculture,\n  BS Biology … and más.";
        cache.cache_ai_response("list programs", reply, "maximum-retrieval");

        assert_eq!(cache.get_cached_ai_response("list programs").as_deref(), Some(reply));
        let entry = cache.get_entry("list programs").unwrap();
        assert_eq!(entry.complexity, "maximum-retrieval");
        assert!(cache.get_cached_ai_response("other").is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let cache = ResponseCache::default();
        cache.cache_ai_response("k", "first", "standard");
        cache.cache_ai_response("k", "second", "standard");
        assert_eq!(cache.get_cached_ai_response("k").as_deref(), Some("second"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_returns_count() {
        let cache = ResponseCache::default();
        assert_eq!(cache.clear_ai_response_cache(), 0);

        cache.cache_ai_response("a", "1", "standard");
        cache.cache_ai_response("b", "2", "standard");
        cache.cache_ai_response("c", "3", "standard");
        assert_eq!(cache.clear_ai_response_cache(), 3);
        assert!(cache.is_empty());
        assert!(cache.get_cached_ai_response("a").is_none());
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let cache = ResponseCache::new(&CacheConfig { capacity: 2, ttl_secs: None });
        cache.cache_ai_response("a", "1", "standard");
        cache.cache_ai_response("b", "2", "standard");
        // touch "a" so "b" becomes the eviction candidate
        assert!(cache.get_cached_ai_response("a").is_some());
        cache.cache_ai_response("c", "3", "standard");

        assert_eq!(cache.len(), 2);
        assert!(cache.get_cached_ai_response("a").is_some());
        assert!(cache.get_cached_ai_response("b").is_none());
    }

    #[test]
    fn test_zero_capacity_still_holds_one() {
        let cache = ResponseCache::new(&CacheConfig { capacity: 0, ttl_secs: None });
        cache.cache_ai_response("a", "1", "standard");
        assert_eq!(cache.get_cached_ai_response("a").as_deref(), Some("1"));
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = ResponseCache::new(&CacheConfig { capacity: 10, ttl_secs: Some(0) });
        cache.cache_ai_response("a", "1", "standard");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(cache.get_cached_ai_response("a").is_none());
        assert!(cache.is_empty());
    }
}
