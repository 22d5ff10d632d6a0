//! Vitrine cache layer
//!
//! The catalog service talks to the cache only through [`CachePort`], a
//! string-keyed store with TTLs and prefix deletion. Two adapters ship:
//!
//! - [`RedisCache`]: shared cache for multi-process deployments
//! - [`MemoryCache`]: in-process LRU used when no cache URL is configured
//!
//! Keys are produced by [`KeySpace`]; every list key lives under a single
//! prefix so a whole generation of cached listings can be purged at once.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! url = "redis://127.0.0.1:6379"
//! key_prefix = "vitrine:product:"
//! entity_ttl_seconds = 1800
//! list_ttl_seconds = 300
//! ```

mod config;
mod keys;
mod lock;
mod memory;
mod port;
mod redis;

pub use config::CacheConfig;
pub use keys::KeySpace;
pub use memory::{METRIC_MEMORY_EVICT_TOTAL, MemoryCache};
pub use port::{CacheError, CachePort};
pub use self::redis::RedisCache;
