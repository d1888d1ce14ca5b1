//! List query parameters and page responses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Prefix shared by every list cache key.
pub const LIST_KEY_PREFIX: &str = "list:";

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Pagination, sort and filter parameters of a list request.
///
/// The query doubles as the cache key: two queries with the same parameters
/// share a cache entry.
///
/// ```rust
/// # use muninn::{ListQuery, SortOrder};
/// let query = ListQuery::new()
///     .page(2)
///     .page_size(20)
///     .sort_by("nNF", SortOrder::Desc)
///     .filter("natOp", "VENDA");
/// assert_eq!(
///     query.cache_key(),
///     "list:page=2&pageSize=20&sortBy=nNF&sortOrder=desc&natOp=VENDA"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// 1-based page number. Default: 1.
    pub page: u32,
    pub page_size: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    /// Arbitrary field filters, kept sorted so the cache key is stable.
    pub filters: BTreeMap<String, String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: None,
            sort_by: None,
            sort_order: None,
            filters: BTreeMap::new(),
        }
    }
}

impl ListQuery {
    /// First page, no sorting or filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page number.
    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Set the page size.
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Sort by `field` in `order`.
    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(field.into());
        self.sort_order = Some(order);
        self
    }

    /// Add (or replace) a filter.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    /// Query-string pairs, in a stable order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("page".to_string(), self.page.to_string())];
        if let Some(size) = self.page_size {
            pairs.push(("pageSize".into(), size.to_string()));
        }
        if let Some(field) = &self.sort_by {
            pairs.push(("sortBy".into(), field.clone()));
        }
        if let Some(order) = self.sort_order {
            pairs.push(("sortOrder".into(), order.as_str().into()));
        }
        pairs.extend(self.filters.iter().map(|(k, v)| (k.clone(), v.clone())));
        pairs
    }

    /// Cache key for this query, e.g. `list:page=1`.
    pub fn cache_key(&self) -> String {
        let params: Vec<String> = self
            .query_pairs()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("{LIST_KEY_PREFIX}{}", params.join("&"))
    }
}

/// One page of records as returned by [`ApiClient::list()`](super::ApiClient::list).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<R> {
    pub data: Vec<R>,
    /// Total records matching the query, across all pages.
    pub total_count: u64,
    pub has_more: bool,
}

/// Accept both list response shapes.
///
/// The cursor form (`{ data, totalCount, hasMore }`) is preferred. The
/// numbered form (`{ data, total, page, pageSize }`, also spelled
/// `current_page` / `page_size`) is what the record service returns.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum RawPage<R> {
    Cursor {
        data: Vec<R>,
        #[serde(rename = "totalCount")]
        total_count: u64,
        #[serde(rename = "hasMore")]
        has_more: bool,
    },
    Numbered {
        data: Vec<R>,
        total: u64,
        #[serde(alias = "current_page")]
        page: u64,
        #[serde(rename = "pageSize", alias = "page_size")]
        page_size: u64,
    },
}

impl<R> From<RawPage<R>> for Page<R> {
    fn from(raw: RawPage<R>) -> Self {
        match raw {
            RawPage::Cursor {
                data,
                total_count,
                has_more,
            } => Page {
                data,
                total_count,
                has_more,
            },
            RawPage::Numbered {
                data,
                total,
                page,
                page_size,
            } => Page {
                data,
                total_count: total,
                has_more: page.saturating_mul(page_size) < total,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_key() {
        assert_eq!(ListQuery::new().cache_key(), "list:page=1");
    }

    #[test]
    fn filters_are_sorted_in_key() {
        let a = ListQuery::new().filter("b", "2").filter("a", "1");
        let b = ListQuery::new().filter("a", "1").filter("b", "2");
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), "list:page=1&a=1&b=2");
    }

    #[test]
    fn parses_cursor_shape() {
        let json = r#"{"data":[1,2],"totalCount":10,"hasMore":true}"#;
        let page: Page<u32> = serde_json::from_str::<RawPage<u32>>(json).unwrap().into();
        assert_eq!(page.data, vec![1, 2]);
        assert_eq!(page.total_count, 10);
        assert!(page.has_more);
    }

    #[test]
    fn parses_numbered_shape() {
        let json = r#"{"data":[1,2],"total":4,"page":2,"pageSize":2}"#;
        let page: Page<u32> = serde_json::from_str::<RawPage<u32>>(json).unwrap().into();
        assert_eq!(page.total_count, 4);
        assert!(!page.has_more);
    }

    #[test]
    fn parses_service_pagination_shape() {
        let json = r#"{"data":[1],"total":3,"current_page":1,"page_size":1,"total_pages":3}"#;
        let page: Page<u32> = serde_json::from_str::<RawPage<u32>>(json).unwrap().into();
        assert_eq!(page.total_count, 3);
        assert!(page.has_more);
    }
}
