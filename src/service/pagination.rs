use serde::Serialize;

/// How many page links a listing shows around the current page.
pub const DEFAULT_QTY_PAGES: u32 = 4;

/// Page-link window for a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// Page numbers to render, 1-based and ascending.
    pub pages: Vec<u32>,
    pub current_page: u32,
    pub total_pages: u32,
    pub has_previous: bool,
    pub has_next: bool,
    /// The window no longer shows page 1.
    pub first_page_out_of_range: bool,
    /// The window does not reach the last page.
    pub last_page_out_of_range: bool,
}

/// Builds a sliding window of `qty_pages` page numbers centred on `current_page`.
///
/// The window is shifted right when it would start before page 1 and left
/// when it would run past the last page.
pub fn make_pagination(total_pages: u32, current_page: u32, qty_pages: u32) -> Pagination {
    let total = i64::from(total_pages);
    let current = i64::from(current_page);
    let middle = i64::from(qty_pages.div_ceil(2));

    let mut start = current - middle;
    let mut stop = current + middle;

    if start < 0 {
        stop += -start;
        start = 0;
    }

    if stop >= total {
        start -= (total - stop).abs();
    }

    // fewer pages than the window: show them all
    let from = start.clamp(0, total);
    let to = stop.clamp(0, total);

    let pages = (from..to).map(|index| (index + 1) as u32).collect();

    Pagination {
        pages,
        current_page,
        total_pages,
        has_previous: current_page > 1,
        has_next: current_page < total_pages,
        first_page_out_of_range: current > middle,
        last_page_out_of_range: stop < total,
    }
}
