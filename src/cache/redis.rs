//! Redis cache adapter.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

use super::config::CacheConfig;
use super::port::{CacheError, CachePort};

/// Cache backed by a shared Redis instance.
///
/// The [`ConnectionManager`] multiplexes one connection and reconnects on
/// failure; each call works on a cheap clone of it.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    scan_batch: usize,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("connection", &"<ConnectionManager>")
            .field("scan_batch", &self.scan_batch)
            .finish()
    }
}

impl RedisCache {
    pub async fn connect(url: &str, config: &CacheConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(CacheError::from)?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(CacheError::from)?;

        Ok(Self {
            connection,
            scan_batch: config.scan_batch.max(1),
        })
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;
        Ok(())
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            CacheError::Timeout
        } else if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error()
        {
            CacheError::connection(err)
        } else {
            CacheError::command(err)
        }
    }
}

#[async_trait]
impl CachePort for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut connection = self.connection.clone();
        let value: Option<String> = connection.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        match ttl {
            // SETEX rejects a zero expiry.
            Some(ttl) => {
                let seconds = ttl.as_secs().max(1);
                let _: () = connection.set_ex(key, value, seconds).await?;
            }
            None => {
                let _: () = connection.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        let _: u64 = connection.del(key).await?;
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut connection = self.connection.clone();
        let pattern = scan_pattern(prefix);
        let mut cursor = 0u64;
        let mut removed = 0u64;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.scan_batch)
                .query_async(&mut connection)
                .await?;

            if !keys.is_empty() {
                let deleted: u64 = connection.del(&keys).await?;
                removed += deleted;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(prefix, removed, "Deleted cache keys by prefix");
        Ok(removed)
    }
}

/// `MATCH` pattern selecting every key that starts with `prefix`.
fn scan_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('*');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_pattern_appends_wildcard() {
        assert_eq!(scan_pattern("vitrine:product:list:"), "vitrine:product:list:*");
    }

    #[test]
    fn scan_pattern_escapes_glob_metacharacters() {
        assert_eq!(scan_pattern("a*b?[c]\\"), "a\\*b\\?\\[c\\]\\\\*");
    }

    #[test]
    fn redis_errors_map_to_cache_errors() {
        let err = redis::RedisError::from((redis::ErrorKind::TypeError, "bad type"));
        assert!(matches!(CacheError::from(err), CacheError::Command(_)));

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = redis::RedisError::from(io);
        assert!(matches!(CacheError::from(err), CacheError::Connection(_)));
    }
}
