pub use vitrine_api_types::{
    ProductCreateRequest, ProductListQuery, ProductPageResponse, ProductResponse,
    ProductUpdateRequest,
};

use crate::application::pagination::{ListParams, PagedResult};
use crate::domain::entities::ProductRecord;

pub fn product_response(record: ProductRecord) -> ProductResponse {
    ProductResponse {
        id: record.id,
        name: record.name,
        price: record.price,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

pub fn page_response(page: PagedResult<ProductRecord>) -> ProductPageResponse {
    let total_pages = page.total_pages();
    let page = page.map(product_response);
    ProductPageResponse {
        items: page.items,
        total: page.total,
        page: page.page,
        page_size: page.page_size,
        total_pages,
    }
}

/// Numbers that do not parse are treated as absent and fall back to defaults.
pub fn list_params(query: ProductListQuery) -> ListParams {
    ListParams {
        keyword: query.keyword,
        page: parse_lenient(query.page.as_deref()),
        page_size: parse_lenient(query.page_size.as_deref()),
        sort_field: query.sort,
        sort_direction: query.direction,
    }
}

fn parse_lenient(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_numbers_become_defaults() {
        let params = list_params(ProductListQuery {
            page: Some("two".into()),
            page_size: Some(" 15 ".into()),
            ..Default::default()
        });
        assert_eq!(params.page, None);
        assert_eq!(params.page_size, Some(15));

        let query = params.normalize();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 15);
    }

    #[test]
    fn negative_numbers_are_clamped_not_rejected() {
        let query = list_params(ProductListQuery {
            page: Some("-3".into()),
            page_size: Some("100000".into()),
            ..Default::default()
        })
        .normalize();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 100);
    }
}
