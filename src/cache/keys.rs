//! Cache key definitions.
//!
//! Two key families live under one namespace prefix:
//!
//! - `{prefix}entity:{id}` for single products
//! - `{prefix}list:{keyword|all}:{page}:{page_size}:{sort}:{direction}` for listings
//!
//! Every listing key starts with [`KeySpace::list_prefix`], so invalidation
//! never needs to know which query shapes were cached.

use std::fmt::Write as _;

use uuid::Uuid;

use crate::application::pagination::ListQuery;

const ENTITY_SEGMENT: &str = "entity:";
const LIST_SEGMENT: &str = "list:";
const ALL_KEYWORDS: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn entity_key(&self, id: Uuid) -> String {
        format!("{}{ENTITY_SEGMENT}{id}", self.prefix)
    }

    pub fn list_prefix(&self) -> String {
        format!("{}{LIST_SEGMENT}", self.prefix)
    }

    /// Key for a normalized listing query.
    pub fn list_key(&self, query: &ListQuery) -> String {
        let keyword = match query.keyword.as_deref() {
            Some(keyword) => encode_keyword(keyword),
            None => ALL_KEYWORDS.to_string(),
        };

        format!(
            "{}{keyword}:{}:{}:{}:{}",
            self.list_prefix(),
            query.page,
            query.page_size,
            query.sort_field,
            query.sort_direction,
        )
    }
}

/// Lowercases the keyword (matching is case-insensitive) and percent-encodes
/// segment separators and glob metacharacters.
///
/// A keyword that is literally `all` is encoded as `%61ll` so it cannot
/// collide with the unfiltered listing.
fn encode_keyword(keyword: &str) -> String {
    let lowered = keyword.to_lowercase();
    if lowered == ALL_KEYWORDS {
        return "%61ll".to_string();
    }

    let mut encoded = String::with_capacity(lowered.len());
    for ch in lowered.chars() {
        match ch {
            ':' | '*' | '?' | '[' | ']' | '\\' | '%' => {
                let _ = write!(encoded, "%{:02X}", ch as u32);
            }
            _ => encoded.push(ch),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::ListParams;

    fn keys() -> KeySpace {
        KeySpace::new("vitrine:product:")
    }

    fn list(keyword: Option<&str>, page: i64, size: i64, sort: &str, dir: &str) -> ListQuery {
        ListParams {
            keyword: keyword.map(str::to_string),
            page: Some(page),
            page_size: Some(size),
            sort_field: Some(sort.to_string()),
            sort_direction: Some(dir.to_string()),
        }
        .normalize()
    }

    #[test]
    fn entity_key_layout() {
        let id = Uuid::nil();
        assert_eq!(
            keys().entity_key(id),
            "vitrine:product:entity:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn list_key_layout() {
        let query = list(Some("Wid"), 2, 10, "price", "asc");
        assert_eq!(
            keys().list_key(&query),
            "vitrine:product:list:wid:2:10:price:asc"
        );

        let query = list(None, 1, 20, "unknown", "unknown");
        assert_eq!(
            keys().list_key(&query),
            "vitrine:product:list:all:1:20:createdAt:desc"
        );
    }

    #[test]
    fn every_list_key_shares_the_list_prefix() {
        let space = keys();
        let prefix = space.list_prefix();
        let samples = [
            list(None, 1, 1, "name", "asc"),
            list(Some("a:b*c"), 7, 100, "updatedAt", "desc"),
            list(Some("all"), 3, 50, "createdAt", "asc"),
            list(Some("%"), 1, 20, "price", "desc"),
        ];
        for query in samples {
            assert!(space.list_key(&query).starts_with(&prefix));
        }
        assert!(!space.entity_key(Uuid::new_v4()).starts_with(&prefix));
    }

    #[test]
    fn keyword_cannot_spill_into_other_segments() {
        let query = list(Some("a:1:1"), 1, 20, "name", "asc");
        let key = keys().list_key(&query);
        let tail = key.trim_start_matches("vitrine:product:list:");
        assert_eq!(tail.split(':').count(), 5);
        assert!(tail.starts_with("a%3A1%3A1:"));
    }

    #[test]
    fn keyword_named_all_does_not_alias_unfiltered_listing() {
        let filtered = list(Some("ALL"), 1, 20, "name", "asc");
        let unfiltered = list(None, 1, 20, "name", "asc");
        assert_ne!(keys().list_key(&filtered), keys().list_key(&unfiltered));
    }

    #[test]
    fn keyword_case_does_not_change_key() {
        let upper = list(Some("WIDGET"), 1, 20, "name", "asc");
        let lower = list(Some("widget"), 1, 20, "name", "asc");
        assert_eq!(keys().list_key(&upper), keys().list_key(&lower));
    }

    #[test]
    fn glob_metacharacters_are_encoded() {
        assert_eq!(encode_keyword("*?[]\\"), "%2A%3F%5B%5D%5C");
    }

    #[test]
    fn key_is_derived_from_the_normalized_query() {
        let raw = ListParams {
            page: Some(0),
            page_size: Some(500),
            ..Default::default()
        }
        .normalize();
        assert_eq!(
            keys().list_key(&raw),
            "vitrine:product:list:all:1:100:createdAt:desc"
        );
    }
}
