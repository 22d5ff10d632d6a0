//! Offset pagination and sorting for catalog listings.
//!
//! Callers hand in loosely-typed [`ListParams`]; [`ListParams::normalize`]
//! always yields a usable [`ListQuery`]. Nothing here rejects input.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortField {
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "price")]
    Price,
    #[default]
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "updatedAt")]
    UpdatedAt,
}

impl SortField {
    /// Lenient parse: unknown or absent input falls back to `createdAt`.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "name" => Self::Name,
            "price" => Self::Price,
            "createdat" | "created_at" => Self::CreatedAt,
            "updatedat" | "updated_at" => Self::UpdatedAt,
            _ => Self::default(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Price => "price",
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Lenient parse: unknown or absent input falls back to `desc`.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("asc") => Self::Asc,
            Some("desc") => Self::Desc,
            _ => Self::default(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw listing parameters as they arrive from a caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListParams {
    pub keyword: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort_field: Option<String>,
    pub sort_direction: Option<String>,
}

impl ListParams {
    pub fn normalize(&self) -> ListQuery {
        let keyword = self
            .keyword
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        let page = self
            .page
            .map(|page| page.clamp(1, i64::from(u32::MAX)) as u32)
            .unwrap_or(1);

        let page_size = self
            .page_size
            .map(|size| size.clamp(1, i64::from(MAX_PAGE_SIZE)) as u32)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        ListQuery {
            keyword,
            page,
            page_size,
            sort_field: SortField::parse_or_default(self.sort_field.as_deref()),
            sort_direction: SortDirection::parse_or_default(self.sort_direction.as_deref()),
        }
    }
}

/// A normalized listing query. Construct through [`ListParams::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListQuery {
    pub keyword: Option<String>,
    pub page: u32,
    pub page_size: u32,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
}

impl ListQuery {
    pub fn limit(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        ListParams::default().normalize()
    }
}

/// One page of results plus the size of the unpaged matching set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: u64, query: &ListQuery) -> Self {
        Self {
            items,
            total,
            page: query.page,
            page_size: query.page_size,
        }
    }

    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.page_size.max(1)))
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}
