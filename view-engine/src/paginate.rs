//! FILENAME: view-engine/src/paginate.rs
//! Paginator - client-mode page slicing and metadata.

use std::ops::Range;

use crate::definition::PageState;
use crate::view::PageInfo;

/// Total pages for a sequence, clamped to at least 1 so an empty result
/// still renders page 1 of 1.
pub fn total_pages(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    total.div_ceil(page_size).max(1)
}

/// Clamps a requested page into `[1, total_pages]`.
pub fn clamp_page(page: usize, total: usize, page_size: usize) -> usize {
    page.max(1).min(total_pages(total, page_size))
}

/// The index range of one page. The page is clamped first, so a page left
/// dangling after filtering shrank the set slides down automatically.
pub fn slice(total: usize, page: usize, page_size: usize) -> Range<usize> {
    if page_size == 0 {
        return 0..total;
    }
    let page = clamp_page(page, total, page_size);
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(total);
    start.min(total)..end
}

/// The page that keeps the first visible record approximately stationary
/// across a page-size change, rather than resetting to page 1.
pub fn reposition(old_page: usize, old_size: usize, new_size: usize) -> usize {
    if new_size == 0 {
        return 1;
    }
    let old_start = old_page.saturating_sub(1) * old_size;
    old_start / new_size + 1
}

/// Applies a page-size change to the state, repositioning the page.
pub fn change_page_size(state: &mut PageState, new_size: usize) {
    state.page = reposition(state.page, state.page_size, new_size);
    state.page_size = new_size;
}

/// Derived metadata for the current state against a sequence length.
pub fn page_info(state: PageState, total: usize) -> PageInfo {
    PageInfo {
        page: clamp_page(state.page, total, state.page_size),
        page_size: state.page_size,
        total_pages: total_pages(total, state.page_size),
        total_items: total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_clamps_to_one() {
        assert_eq!(total_pages(0, 20), 1);
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
    }

    #[test]
    fn test_slice_bounds() {
        assert_eq!(slice(45, 1, 20), 0..20);
        assert_eq!(slice(45, 3, 20), 40..45);
        // Out-of-range page clamps down.
        assert_eq!(slice(45, 9, 20), 40..45);
        assert_eq!(slice(0, 1, 20), 0..0);
    }

    #[test]
    fn test_pages_round_trip_the_sequence() {
        let total = 103;
        let size = 20;
        let mut rebuilt = Vec::new();
        for page in 1..=total_pages(total, size) {
            rebuilt.extend(slice(total, page, size));
        }
        assert_eq!(rebuilt, (0..total).collect::<Vec<_>>());
    }

    #[test]
    fn test_page_size_change_keeps_first_record() {
        // Viewing page 3 at size 20 (rows 41-60, start index 40); growing to
        // size 50 lands on the page containing index 40.
        assert_eq!(reposition(3, 20, 50), 1);
        // Shrinking from size 50 page 2 (start 50) to size 10 → page 6.
        assert_eq!(reposition(2, 50, 10), 6);

        let mut state = PageState { page: 3, page_size: 20 };
        change_page_size(&mut state, 50);
        assert_eq!(state.page, 1);
        assert!(slice(60, state.page, state.page_size).contains(&40));
    }

    #[test]
    fn test_page_info_reflects_clamping() {
        let info = page_info(PageState { page: 9, page_size: 20 }, 45);
        assert_eq!(info.page, 3);
        assert_eq!(info.total_pages, 3);
        assert_eq!(info.total_items, 45);
    }
}
