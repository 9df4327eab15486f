//! Pagination utilities for the admin listings

/// Page size for item and log listings
pub const PAGE_SIZE: u64 = 50;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: u64,
    /// Total number of pages (at least 1, even when empty)
    pub total_pages: u64,
    /// Offset for the store's listing query
    pub offset: u64,
    pub has_prev: bool,
    pub has_next: bool,
}

/// Calculate pagination metadata from total results and requested page
///
/// Ensures page is within valid bounds [1, total_pages]. A page size of 0 is
/// treated as 1.
///
/// # Examples
/// ```
/// use tagscan_server::pagination::paginate;
///
/// // 120 results at 50 per page = 3 pages (50 + 50 + 20)
/// let p = paginate(120, 50, 3);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 100);
/// assert!(p.has_prev && !p.has_next);
///
/// // Requesting out-of-bounds page gets clamped
/// let p = paginate(0, 50, 5);
/// assert_eq!(p.page, 1);
/// assert_eq!(p.offset, 0);
/// ```
pub fn paginate(total: u64, page_size: u64, requested_page: u64) -> Pagination {
    let page_size = page_size.max(1);
    let total_pages = total.div_ceil(page_size).max(1);
    let page = requested_page.clamp(1, total_pages);
    let offset = (page - 1) * page_size;

    Pagination {
        page,
        total_pages,
        offset,
        has_prev: page > 1,
        has_next: page < total_pages,
    }
}
