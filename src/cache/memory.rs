//! In-process cache adapter.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;

use super::config::CacheConfig;
use super::lock::mutex_lock;
use super::port::{CacheError, CachePort};

const SOURCE: &str = "cache::memory";
pub const METRIC_MEMORY_EVICT_TOTAL: &str = "vitrine_cache_memory_evict_total";

#[derive(Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// LRU cache with per-entry absolute expiry.
///
/// Expired entries are treated as absent and dropped when next touched.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.memory_capacity_non_zero())),
        }
    }

    /// Number of stored entries, including expired ones not yet dropped.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

#[async_trait]
impl CachePort for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.pop(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let entry = MemoryEntry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        let evicted = mutex_lock(&self.entries, SOURCE, "set").push(key.to_string(), entry);
        if let Some((evicted_key, _)) = evicted
            && evicted_key != key
        {
            counter!(METRIC_MEMORY_EVICT_TOTAL).increment(1);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        mutex_lock(&self.entries, SOURCE, "delete").pop(key);
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "delete_by_prefix");
        let matching: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &matching {
            entries.pop(key);
        }
        Ok(matching.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[tokio::test]
    async fn roundtrip_and_delete() {
        let cache = MemoryCache::default();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set("k", "v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);

        // Deleting again is not an error.
        cache.delete("k").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_read_as_misses() {
        let cache = MemoryCache::default();
        cache
            .set("short", "v", Some(Duration::from_secs(5)))
            .await
            .unwrap();
        cache.set("forever", "v", None).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cache.get("short").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("short").await.unwrap(), None);
        assert!(cache.get("forever").await.unwrap().is_some());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn delete_by_prefix_only_touches_matching_keys() {
        let cache = MemoryCache::default();
        cache.set("p:list:a", "1", None).await.unwrap();
        cache.set("p:list:b", "2", None).await.unwrap();
        cache.set("p:entity:1", "3", None).await.unwrap();

        assert_eq!(cache.delete_by_prefix("p:list:").await.unwrap(), 2);
        assert_eq!(cache.get("p:list:a").await.unwrap(), None);
        assert!(cache.get("p:entity:1").await.unwrap().is_some());

        assert_eq!(cache.delete_by_prefix("p:list:").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_by_prefix_on_empty_cache() {
        let cache = MemoryCache::default();
        assert_eq!(cache.delete_by_prefix("anything").await.unwrap(), 0);
        assert_eq!(cache.delete_by_prefix("anything").await.unwrap(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn lru_eviction() {
        let config = CacheConfig {
            memory_capacity: 2,
            ..Default::default()
        };
        let cache = MemoryCache::new(&config);

        cache.set("a", "1", None).await.unwrap();
        cache.set("b", "2", None).await.unwrap();
        assert!(cache.get("a").await.unwrap().is_some());

        // "b" is now least recently used.
        cache.set("c", "3", None).await.unwrap();

        assert!(cache.get("a").await.unwrap().is_some());
        assert_eq!(cache.get("b").await.unwrap(), None);
        assert!(cache.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn recovers_from_poisoned_lock() {
        let cache = MemoryCache::default();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache
                .entries
                .lock()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        cache.set("k", "v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
