use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),
    #[error("cache command failed: {0}")]
    Command(String),
    #[error("cache operation timed out")]
    Timeout,
}

impl CacheError {
    pub fn command(err: impl std::fmt::Display) -> Self {
        Self::Command(err.to_string())
    }

    pub fn connection(err: impl std::fmt::Display) -> Self {
        Self::Connection(err.to_string())
    }
}

/// String-keyed cache with TTLs and prefix deletion.
///
/// A miss is `Ok(None)`, never an error. Deletes are idempotent.
#[async_trait]
pub trait CachePort: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value`; `ttl: None` keeps the entry until it is deleted or evicted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Removes every key starting with `prefix` and returns how many were removed.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
}
