//! Cache configuration.
//!
//! Resolved from the `[cache]` section of `vitrine.toml` (see `crate::config`).

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_KEY_PREFIX: &str = "vitrine:product:";
const DEFAULT_ENTITY_TTL_SECS: u64 = 30 * 60;
const DEFAULT_LIST_TTL_SECS: u64 = 5 * 60;
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;
const DEFAULT_SCAN_BATCH: usize = 100;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis connection URL; `None` selects the in-process cache.
    pub url: Option<String>,
    /// Namespace shared by every key this service writes.
    pub key_prefix: String,
    /// Lifetime of single-product entries.
    pub entity_ttl: Duration,
    /// Lifetime of listing pages. Shorter than `entity_ttl`: listings change
    /// with every write and stale pages are visible while paging.
    pub list_ttl: Duration,
    /// Maximum entries held by the in-process cache.
    pub memory_capacity: usize,
    /// `COUNT` hint for each `SCAN` round during prefix deletion.
    pub scan_batch: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            entity_ttl: Duration::from_secs(DEFAULT_ENTITY_TTL_SECS),
            list_ttl: Duration::from_secs(DEFAULT_LIST_TTL_SECS),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            scan_batch: DEFAULT_SCAN_BATCH,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            url: settings.url.clone(),
            key_prefix: settings.key_prefix.clone(),
            entity_ttl: settings.entity_ttl,
            list_ttl: settings.list_ttl,
            memory_capacity: settings.memory_capacity.get(),
            scan_batch: settings.scan_batch.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn uses_redis(&self) -> bool {
        self.url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.url, None);
        assert_eq!(config.key_prefix, "vitrine:product:");
        assert_eq!(config.entity_ttl, Duration::from_secs(1800));
        assert_eq!(config.list_ttl, Duration::from_secs(300));
        assert!(config.list_ttl < config.entity_ttl);
        assert_eq!(config.memory_capacity, 10_000);
        assert_eq!(config.scan_batch, 100);
        assert!(!config.uses_redis());
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            memory_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.memory_capacity_non_zero().get(), 1);
    }
}
