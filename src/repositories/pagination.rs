//! Page-based windows over repository list queries

use serde::{Deserialize, Serialize};

/// A zero-indexed page window requested by the caller.
///
/// Repositories translate this directly into the `LIMIT`/`OFFSET` operands
/// of their queries, so a sequence of requests with increasing `page` walks
/// the full result set without skipping or repeating rows (ordering is
/// fixed per query).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number, starting at 0
    pub page: u32,
    /// Rows per page
    pub per_page: u32,
}

impl PageRequest {
    pub const DEFAULT_PER_PAGE: u32 = 50;

    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    /// `LIMIT` operand.
    pub fn limit(self) -> i64 {
        i64::from(self.per_page)
    }

    /// `OFFSET` operand. Widened before multiplying so large page numbers
    /// cannot overflow.
    pub fn offset(self) -> i64 {
        i64::from(self.page) * i64::from(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            per_page: Self::DEFAULT_PER_PAGE,
        }
    }
}

/// One page of results together with the unpaged row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Rows of the current page, in query order
    pub items: Vec<T>,
    /// Total matching rows across every page
    pub total: i64,
    /// Page number this window corresponds to
    pub page: u32,
    /// Rows per page that was requested
    pub per_page: u32,
}

impl<T> Page<T> {
    /// Pair a fetched window with the count of the same query unpaged.
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            per_page: request.per_page,
        }
    }

    /// Number of pages needed to cover `total` rows.
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        let total = self.total.max(0) as u64;
        total.div_ceil(u64::from(self.per_page)).min(u64::from(u32::MAX)) as u32
    }

    /// Whether another page follows this one.
    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_request_starts_at_first_page() {
        let request = PageRequest::default();
        assert_eq!(request.page, 0);
        assert_eq!(request.per_page, PageRequest::DEFAULT_PER_PAGE);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn test_offset_walks_in_page_steps() {
        assert_eq!(PageRequest::new(0, 20).offset(), 0);
        assert_eq!(PageRequest::new(3, 20).offset(), 60);
        assert_eq!(PageRequest::new(3, 20).limit(), 20);
    }

    #[test]
    fn test_offset_survives_extreme_page_numbers() {
        let request = PageRequest::new(u32::MAX, u32::MAX);
        assert_eq!(
            request.offset(),
            i64::from(u32::MAX) * i64::from(u32::MAX)
        );
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page: Page<i32> = Page::new(vec![], 25, PageRequest::new(0, 10));
        assert_eq!(page.total_pages(), 3);

        let exact: Page<i32> = Page::new(vec![], 30, PageRequest::new(0, 10));
        assert_eq!(exact.total_pages(), 3);
    }

    #[test]
    fn test_has_next_stops_on_last_page() {
        let first = Page::new(vec![1, 2], 5, PageRequest::new(0, 2));
        assert!(first.has_next());

        let last = Page::new(vec![5], 5, PageRequest::new(2, 2));
        assert!(!last.has_next());
    }

    #[test]
    fn test_zero_per_page_yields_no_pages() {
        let page: Page<i32> = Page::new(vec![], 25, PageRequest::new(0, 0));
        assert_eq!(page.total_pages(), 0);
        assert!(!page.has_next());
    }

    #[test]
    fn test_empty_page() {
        let page: Page<i32> = Page::new(vec![], 0, PageRequest::default());
        assert!(page.is_empty());
        assert_eq!(page.total_pages(), 0);
    }
}
