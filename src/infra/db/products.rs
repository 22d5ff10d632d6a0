use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::{ListQuery, SortDirection, SortField},
    application::repos::{ProductsRepo, RepoError},
    domain::entities::ProductRecord,
};

use super::{PostgresRepositories, escape_like, map_sqlx_error};

const PRODUCT_COLUMNS: &str = "id, name, price, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    price: f64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ProductRow> for ProductRecord {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            price: row.price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Column for each sortable field. Caller input only ever selects from here.
fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::Name => "name",
        SortField::Price => "price",
        SortField::CreatedAt => "created_at",
        SortField::UpdatedAt => "updated_at",
    }
}

fn sort_keyword(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    }
}

impl PostgresRepositories {
    fn push_keyword_filter(qb: &mut QueryBuilder<'_, Postgres>, keyword: Option<&str>) {
        if let Some(keyword) = keyword {
            qb.push(" WHERE name ILIKE ");
            qb.push_bind(format!("%{}%", escape_like(keyword)));
            qb.push(" ESCAPE '\\'");
        }
    }
}

#[async_trait]
impl ProductsRepo for PostgresRepositories {
    async fn create(&self, record: &ProductRecord) -> Result<ProductRecord, RepoError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO products ({PRODUCT_COLUMNS}) VALUES ($1, $2, $3, $4, $5) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(record.id)
        .bind(&record.name)
        .bind(record.price)
        .bind(record.created_at)
        .bind(record.updated_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ProductRecord>, RepoError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ProductRecord::from))
    }

    async fn query(&self, query: &ListQuery) -> Result<Vec<ProductRecord>, RepoError> {
        let mut qb = QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        Self::push_keyword_filter(&mut qb, query.keyword.as_deref());

        let column = sort_column(query.sort_field);
        let direction = sort_keyword(query.sort_direction);
        qb.push(format!(" ORDER BY {column} {direction}, id {direction}"));

        qb.push(" LIMIT ");
        qb.push_bind(i64::from(query.limit()));
        qb.push(" OFFSET ");
        qb.push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));

        let rows = qb
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ProductRecord::from).collect())
    }

    async fn count(&self, keyword: Option<&str>) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM products");
        Self::push_keyword_filter(&mut qb, keyword);

        let count: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn update(&self, record: &ProductRecord) -> Result<ProductRecord, RepoError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE products SET name = $2, price = $3, updated_at = $4 \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(record.id)
        .bind(&record.name)
        .bind(record.price)
        .bind(record.updated_at)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(ProductRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn exists(&self, id: Uuid) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_sort_field_maps_to_a_column() {
        assert_eq!(sort_column(SortField::Name), "name");
        assert_eq!(sort_column(SortField::Price), "price");
        assert_eq!(sort_column(SortField::CreatedAt), "created_at");
        assert_eq!(sort_column(SortField::UpdatedAt), "updated_at");
        assert_eq!(sort_keyword(SortDirection::Asc), "ASC");
        assert_eq!(sort_keyword(SortDirection::Desc), "DESC");
    }

    #[test]
    fn keyword_filter_binds_escaped_pattern() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        PostgresRepositories::push_keyword_filter(&mut qb, Some("50%"));
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM products WHERE name ILIKE $1 ESCAPE '\\'"
        );

        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        PostgresRepositories::push_keyword_filter(&mut qb, None);
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM products");
    }
}
