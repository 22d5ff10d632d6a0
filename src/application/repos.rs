//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::ListQuery;
use crate::domain::entities::ProductRecord;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Durable source of truth for products.
///
/// Implementations persist exactly what they are given: ids and timestamps
/// are assigned by the caller.
#[async_trait]
pub trait ProductsRepo: Send + Sync {
    async fn create(&self, record: &ProductRecord) -> Result<ProductRecord, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ProductRecord>, RepoError>;

    /// Filtered, sorted page of products; paging is applied by the store.
    async fn query(&self, query: &ListQuery) -> Result<Vec<ProductRecord>, RepoError>;

    /// Number of products matching `keyword`, ignoring paging.
    async fn count(&self, keyword: Option<&str>) -> Result<u64, RepoError>;

    /// Full-row update by id. Fails with [`RepoError::NotFound`] when no row matched.
    async fn update(&self, record: &ProductRecord) -> Result<ProductRecord, RepoError>;

    /// Fails with [`RepoError::NotFound`] when no row matched.
    async fn delete(&self, id: Uuid) -> Result<(), RepoError>;

    async fn exists(&self, id: Uuid) -> Result<bool, RepoError>;
}
