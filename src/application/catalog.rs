//! Cache-aside product catalog.
//!
//! Reads go to the cache first and fall back to the store on a miss,
//! populating the cache with what the store returned. Writes go to the store
//! and then remove every cache entry the write could have made stale: the
//! product's own entry and all listing pages.
//!
//! The cache is never authoritative. Every cache call is wrapped so that an
//! error or an undecodable payload reads as a miss and a failed write or
//! delete is logged and ignored.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::application::clock::Clock;
use crate::application::pagination::{ListParams, PagedResult};
use crate::application::repos::{ProductsRepo, RepoError};
use crate::cache::{CacheConfig, CachePort, KeySpace};
use crate::domain::entities::ProductRecord;
use crate::domain::error::DomainError;
use crate::domain::products::ProductDraft;

pub const METRIC_CACHE_HIT_TOTAL: &str = "vitrine_cache_hit_total";
pub const METRIC_CACHE_MISS_TOTAL: &str = "vitrine_cache_miss_total";
pub const METRIC_CACHE_ERROR_TOTAL: &str = "vitrine_cache_error_total";
pub const METRIC_CACHE_INVALIDATED_KEYS_TOTAL: &str = "vitrine_cache_invalidated_keys_total";

const KIND_ENTITY: &str = "entity";
const KIND_LIST: &str = "list";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product `{id}` not found")]
    NotFound { id: Uuid },
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub entity: Duration,
    pub list: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for CacheTtls {
    fn from(config: &CacheConfig) -> Self {
        Self {
            entity: config.entity_ttl,
            list: config.list_ttl,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateProductCommand {
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Clone)]
pub struct UpdateProductCommand {
    pub name: String,
    pub price: f64,
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn ProductsRepo>,
    cache: Arc<dyn CachePort>,
    clock: Arc<dyn Clock>,
    keys: KeySpace,
    ttls: CacheTtls,
}

impl CatalogService {
    pub fn new(
        store: Arc<dyn ProductsRepo>,
        cache: Arc<dyn CachePort>,
        clock: Arc<dyn Clock>,
        keys: KeySpace,
        ttls: CacheTtls,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            keys,
            ttls,
        }
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    #[instrument(skip_all)]
    pub async fn create(
        &self,
        command: CreateProductCommand,
        cancel: &CancellationToken,
    ) -> Result<ProductRecord, CatalogError> {
        let (name, price) = ProductDraft::new(&command.name, command.price)?.into_parts();

        let now = self.clock.now();
        let record = ProductRecord {
            id: Uuid::new_v4(),
            name,
            price,
            created_at: now,
            updated_at: now,
        };

        ensure_active(cancel)?;
        let stored = self.store.create(&record).await?;
        info!(product_id = %stored.id, "Product created");

        self.invalidate_after_write(None).await;
        Ok(stored)
    }

    #[instrument(skip(self, cancel))]
    pub async fn get_by_id(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Option<ProductRecord>, CatalogError> {
        let key = self.keys.entity_key(id);
        if let Some(record) = self
            .read_cached::<ProductRecord>(&key, KIND_ENTITY, cancel)
            .await
        {
            return Ok(Some(record));
        }

        let Some(record) = race(cancel, self.store.find_by_id(id)).await? else {
            return Ok(None);
        };

        self.write_cached(&key, &record, self.ttls.entity, cancel).await;
        Ok(Some(record))
    }

    #[instrument(skip_all, fields(keyword = params.keyword.as_deref()))]
    pub async fn query(
        &self,
        params: &ListParams,
        cancel: &CancellationToken,
    ) -> Result<PagedResult<ProductRecord>, CatalogError> {
        let query = params.normalize();
        let key = self.keys.list_key(&query);

        if let Some(page) = self
            .read_cached::<PagedResult<ProductRecord>>(&key, KIND_LIST, cancel)
            .await
        {
            return Ok(page);
        }

        let items = race(cancel, self.store.query(&query)).await?;
        let total = race(cancel, self.store.count(query.keyword.as_deref())).await?;
        let page = PagedResult::new(items, total, &query);

        self.write_cached(&key, &page, self.ttls.list, cancel).await;
        Ok(page)
    }

    #[instrument(skip(self, command, cancel))]
    pub async fn update(
        &self,
        id: Uuid,
        command: UpdateProductCommand,
        cancel: &CancellationToken,
    ) -> Result<ProductRecord, CatalogError> {
        let (name, price) = ProductDraft::new(&command.name, command.price)?.into_parts();

        let existing = race(cancel, self.store.find_by_id(id))
            .await?
            .ok_or(CatalogError::NotFound { id })?;

        let updated_at = self.clock.now().max(existing.created_at);
        let record = ProductRecord {
            name,
            price,
            updated_at,
            ..existing
        };

        ensure_active(cancel)?;
        let stored = match self.store.update(&record).await {
            Err(RepoError::NotFound) => return Err(CatalogError::NotFound { id }),
            other => other?,
        };
        info!(product_id = %id, "Product updated");

        self.invalidate_after_write(Some(id)).await;
        Ok(stored)
    }

    #[instrument(skip(self, cancel))]
    pub async fn delete(&self, id: Uuid, cancel: &CancellationToken) -> Result<(), CatalogError> {
        if !race(cancel, self.store.exists(id)).await? {
            return Err(CatalogError::NotFound { id });
        }

        ensure_active(cancel)?;
        match self.store.delete(id).await {
            Err(RepoError::NotFound) => return Err(CatalogError::NotFound { id }),
            other => other?,
        }
        info!(product_id = %id, "Product deleted");

        self.invalidate_after_write(Some(id)).await;
        Ok(())
    }

    /// Drops the entity entry (when given) and every listing page.
    ///
    /// Runs once the store write has committed and is not raced against the
    /// caller's token: a committed write always gets its invalidation.
    async fn invalidate_after_write(&self, id: Option<Uuid>) {
        if let Some(id) = id
            && self.cache_delete(&self.keys.entity_key(id)).await
        {
            counter!(METRIC_CACHE_INVALIDATED_KEYS_TOTAL, "kind" => KIND_ENTITY).increment(1);
        }

        if let Some(removed) = self.cache_delete_by_prefix(&self.keys.list_prefix()).await {
            counter!(METRIC_CACHE_INVALIDATED_KEYS_TOTAL, "kind" => KIND_LIST).increment(removed);
        }
    }

    async fn read_cached<T: DeserializeOwned>(
        &self,
        key: &str,
        kind: &'static str,
        cancel: &CancellationToken,
    ) -> Option<T> {
        let decoded = match self.cache_get(key, cancel).await {
            Some(payload) => match serde_json::from_str::<T>(&payload) {
                Ok(value) => Some(value),
                Err(err) => {
                    counter!(METRIC_CACHE_ERROR_TOTAL, "op" => "decode").increment(1);
                    warn!(key, error = %err, "Discarding undecodable cache entry");
                    None
                }
            },
            None => None,
        };

        if decoded.is_some() {
            counter!(METRIC_CACHE_HIT_TOTAL, "kind" => kind).increment(1);
            debug!(key, "Cache hit");
        } else {
            counter!(METRIC_CACHE_MISS_TOTAL, "kind" => kind).increment(1);
            debug!(key, "Cache miss");
        }
        decoded
    }

    async fn write_cached<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
        cancel: &CancellationToken,
    ) {
        match serde_json::to_string(value) {
            Ok(payload) => self.cache_set(key, &payload, ttl, cancel).await,
            Err(err) => {
                counter!(METRIC_CACHE_ERROR_TOTAL, "op" => "encode").increment(1);
                warn!(key, error = %err, "Failed to encode cache entry");
            }
        }
    }

    async fn cache_get(&self, key: &str, cancel: &CancellationToken) -> Option<String> {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            result = self.cache.get(key) => result,
        };

        match result {
            Ok(value) => value,
            Err(err) => {
                counter!(METRIC_CACHE_ERROR_TOTAL, "op" => "get").increment(1);
                warn!(key, error = %err, "Cache read failed; falling back to store");
                None
            }
        }
    }

    async fn cache_set(&self, key: &str, payload: &str, ttl: Duration, cancel: &CancellationToken) {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = self.cache.set(key, payload, Some(ttl)) => result,
        };

        if let Err(err) = result {
            counter!(METRIC_CACHE_ERROR_TOTAL, "op" => "set").increment(1);
            warn!(key, error = %err, "Cache write failed");
        }
    }

    /// Returns whether the delete reached the cache.
    async fn cache_delete(&self, key: &str) -> bool {
        match self.cache.delete(key).await {
            Ok(()) => true,
            Err(err) => {
                counter!(METRIC_CACHE_ERROR_TOTAL, "op" => "delete").increment(1);
                warn!(key, error = %err, "Cache delete failed; entry expires by TTL");
                false
            }
        }
    }

    async fn cache_delete_by_prefix(&self, prefix: &str) -> Option<u64> {
        match self.cache.delete_by_prefix(prefix).await {
            Ok(removed) => {
                debug!(prefix, removed, "Purged cached listings");
                Some(removed)
            }
            Err(err) => {
                counter!(METRIC_CACHE_ERROR_TOTAL, "op" => "delete_by_prefix").increment(1);
                warn!(prefix, error = %err, "Cache prefix purge failed; entries expire by TTL");
                None
            }
        }
    }
}

/// Refuses to start a store write once `cancel` has fired. Writes themselves
/// are never raced: a dropped in-flight write may still commit.
fn ensure_active(cancel: &CancellationToken) -> Result<(), CatalogError> {
    if cancel.is_cancelled() {
        return Err(CatalogError::Cancelled);
    }
    Ok(())
}

/// Runs a store read unless `cancel` fires first.
async fn race<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T, RepoError>>,
) -> Result<T, CatalogError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CatalogError::Cancelled),
        result = call => result.map_err(CatalogError::from),
    }
}
