//! Pagination and sort primitives for admin listings.

use serde::{Deserialize, Serialize};

/// Requested page (1-based) and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Normalize raw input: missing or zero page becomes 1, missing or zero
    /// limit becomes the default, oversized limits are capped.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(Self::DEFAULT_LIMIT)
            .min(Self::MAX_LIMIT);
        Self { page, limit }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Anything other than `asc` (case-insensitive) sorts descending.
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub per_page: u32,
    pub current_page: u32,
    pub last_page: u32,
}

/// One page of results plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub meta: PageMeta,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let last_page = total.div_ceil(u64::from(request.limit)).max(1);
        Self {
            meta: PageMeta {
                total,
                per_page: request.limit,
                current_page: request.page,
                last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
            },
            items,
        }
    }

    /// Slice an already filtered and sorted collection (in-memory stores).
    pub fn from_sorted(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(usize::try_from(request.offset()).unwrap_or(usize::MAX))
            .take(request.limit as usize)
            .collect();
        Self::new(items, total, request)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            meta: self.meta,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_defaults_and_caps() {
        assert_eq!(PageRequest::new(None, None), PageRequest { page: 1, limit: 10 });
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, limit: 10 });
        assert_eq!(PageRequest::new(Some(3), Some(500)).limit, 100);
        assert_eq!(PageRequest::new(Some(3), Some(20)).offset(), 40);
    }

    #[test]
    fn from_sorted_slices_and_counts() {
        let page = Page::from_sorted((1..=25).collect::<Vec<_>>(), PageRequest::new(Some(3), Some(10)));
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.meta.total, 25);
        assert_eq!(page.meta.last_page, 3);
    }

    #[test]
    fn empty_result_has_one_page() {
        let page: Page<u8> = Page::from_sorted(vec![], PageRequest::default());
        assert_eq!(page.meta.last_page, 1);
        assert!(page.items.is_empty());
    }

    #[test]
    fn order_parse_is_lenient() {
        assert_eq!(SortOrder::parse_lenient("ASC"), SortOrder::Asc);
        assert_eq!(SortOrder::parse_lenient("sideways"), SortOrder::Desc);
    }
}
