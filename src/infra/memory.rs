//! In-process product store.
//!
//! Mirrors the Postgres adapter's filtering, ordering and paging so the
//! catalog can run and be tested without a database.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::pagination::{ListQuery, SortDirection, SortField};
use crate::application::repos::{ProductsRepo, RepoError};
use crate::domain::entities::ProductRecord;

#[derive(Debug, Default)]
pub struct MemoryProductsRepo {
    rows: RwLock<HashMap<Uuid, ProductRecord>>,
}

impl MemoryProductsRepo {
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, ProductRecord>> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, ProductRecord>> {
        self.rows.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn matches_keyword(record: &ProductRecord, keyword: Option<&str>) -> bool {
    match keyword {
        Some(keyword) => record
            .name
            .to_lowercase()
            .contains(&keyword.to_lowercase()),
        None => true,
    }
}

fn compare(a: &ProductRecord, b: &ProductRecord, field: SortField) -> Ordering {
    let primary = match field {
        SortField::Name => a.name.cmp(&b.name),
        SortField::Price => a.price.total_cmp(&b.price),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl ProductsRepo for MemoryProductsRepo {
    async fn create(&self, record: &ProductRecord) -> Result<ProductRecord, RepoError> {
        let mut rows = self.write();
        if rows.contains_key(&record.id) {
            return Err(RepoError::Duplicate {
                constraint: "products_pkey".to_string(),
            });
        }
        rows.insert(record.id, record.clone());
        Ok(record.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ProductRecord>, RepoError> {
        Ok(self.read().get(&id).cloned())
    }

    async fn query(&self, query: &ListQuery) -> Result<Vec<ProductRecord>, RepoError> {
        let keyword = query.keyword.as_deref();
        let mut matching: Vec<ProductRecord> = self
            .read()
            .values()
            .filter(|record| matches_keyword(record, keyword))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let ordering = compare(a, b, query.sort_field);
            match query.sort_direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });

        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(query.limit() as usize)
            .collect())
    }

    async fn count(&self, keyword: Option<&str>) -> Result<u64, RepoError> {
        let count = self
            .read()
            .values()
            .filter(|record| matches_keyword(record, keyword))
            .count();
        Ok(count as u64)
    }

    async fn update(&self, record: &ProductRecord) -> Result<ProductRecord, RepoError> {
        let mut rows = self.write();
        let Some(existing) = rows.get_mut(&record.id) else {
            return Err(RepoError::NotFound);
        };
        *existing = record.clone();
        Ok(record.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        self.write()
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }

    async fn exists(&self, id: Uuid) -> Result<bool, RepoError> {
        Ok(self.read().contains_key(&id))
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::application::pagination::ListParams;

    fn product(name: &str, price: f64) -> ProductRecord {
        ProductRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price,
            created_at: datetime!(2024-01-01 00:00:00 UTC),
            updated_at: datetime!(2024-01-01 00:00:00 UTC),
        }
    }

    #[tokio::test]
    async fn keyword_filter_is_case_insensitive() {
        let repo = MemoryProductsRepo::default();
        repo.create(&product("Blue Widget", 1.0)).await.unwrap();
        repo.create(&product("widget", 2.0)).await.unwrap();
        repo.create(&product("Gadget", 3.0)).await.unwrap();

        assert_eq!(repo.count(Some("WIDGET")).await.unwrap(), 2);
        assert_eq!(repo.count(None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn equal_sort_values_break_ties_by_id() {
        let repo = MemoryProductsRepo::default();
        for _ in 0..6 {
            repo.create(&product("Same", 5.0)).await.unwrap();
        }

        let query = ListParams {
            page_size: Some(3),
            sort_field: Some("price".into()),
            sort_direction: Some("asc".into()),
            ..Default::default()
        }
        .normalize();
        let first = repo.query(&query).await.unwrap();
        let second = repo
            .query(&ListQuery {
                page: 2,
                ..query.clone()
            })
            .await
            .unwrap();

        let mut ids: Vec<Uuid> = first.iter().chain(&second).map(|row| row.id).collect();
        let sorted = {
            let mut copy = ids.clone();
            copy.sort();
            copy
        };
        assert_eq!(ids, sorted);
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let repo = MemoryProductsRepo::default();
        let missing = product("Ghost", 1.0);

        assert!(matches!(
            repo.update(&missing).await,
            Err(RepoError::NotFound)
        ));
        assert!(matches!(
            repo.delete(missing.id).await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let repo = MemoryProductsRepo::default();
        let record = product("Widget", 1.0);
        repo.create(&record).await.unwrap();
        assert!(matches!(
            repo.create(&record).await,
            Err(RepoError::Duplicate { .. })
        ));
    }
}
