//! FILENAME: view-engine/src/virtual_scroll.rs
//! Virtual Scroller - viewport windowing over the flattened row sequence.
//!
//! Given a scroll offset and container size, computes the sub-range of rows
//! that must be materialized, with lookahead/lookbehind buffering. Spacer
//! offsets let the materialized rows occupy their true scroll position
//! without rendering everything.

use crate::definition::VirtualConfig;
use crate::view::Viewport;

/// Computes the render window.
///
/// Virtualization is bypassed entirely (full list, `virtualized: false`)
/// while the container is unmeasured, when the row count is at/below the
/// configured threshold, or when the content is shorter than the container.
/// When the dataset shrank below the current scroll position, the offset is
/// clamped and the returned `scroll_top` carries the corrected position.
pub fn compute(
    total: usize,
    scroll_top: f64,
    container_height: f64,
    config: &VirtualConfig,
) -> Viewport {
    let row_height = config.row_height.max(1.0);
    let total_height = total as f64 * row_height;

    let measured = container_height > 0.0;
    if !measured || total <= config.disable_threshold || total_height <= container_height {
        return Viewport {
            start_index: 0,
            end_index: total,
            offset_top: 0.0,
            offset_bottom: 0.0,
            total_height,
            viewport_height: container_height.max(0.0),
            scroll_top: 0.0,
            virtualized: false,
        };
    }

    let max_scroll = (total_height - container_height).max(0.0);
    let scroll_top = scroll_top.clamp(0.0, max_scroll);

    let first_visible = (scroll_top / row_height).floor() as usize;
    let visible_count = (container_height / row_height).ceil() as usize;

    let start_index = first_visible.saturating_sub(config.buffer);
    let end_index = (first_visible + visible_count + config.buffer).min(total);

    Viewport {
        start_index,
        end_index,
        offset_top: start_index as f64 * row_height,
        offset_bottom: (total - end_index) as f64 * row_height,
        total_height,
        viewport_height: container_height,
        scroll_top,
        virtualized: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(row_height: f64, buffer: usize) -> VirtualConfig {
        VirtualConfig {
            row_height,
            buffer,
            disable_threshold: 50,
        }
    }

    #[test]
    fn test_window_formula() {
        // 1000 rows, 40px rows, 400px container, scrollTop 2000, buffer 5:
        // firstVisible=50, visibleCount=10, start=45, end=65.
        let vp = compute(1000, 2000.0, 400.0, &config(40.0, 5));
        assert!(vp.virtualized);
        assert_eq!(vp.start_index, 45);
        assert_eq!(vp.end_index, 65);
        assert_eq!(vp.offset_top, 45.0 * 40.0);
        assert_eq!(vp.offset_bottom, (1000 - 65) as f64 * 40.0);
        assert_eq!(vp.total_height, 40_000.0);
    }

    #[test]
    fn test_bounds_invariant_across_scroll_range() {
        let cfg = config(40.0, 5);
        let total = 321;
        let max_scroll = total as f64 * 40.0 - 400.0;
        let mut step = 0.0;
        while step <= max_scroll {
            let vp = compute(total, step, 400.0, &cfg);
            assert!(vp.start_index <= vp.end_index);
            assert!(vp.end_index <= total);
            step += 37.0;
        }
    }

    #[test]
    fn test_scroll_is_clamped_after_shrink() {
        // Scroll far past the content: the viewport reports the corrected
        // position and still ends at the last row.
        let vp = compute(100, 1_000_000.0, 400.0, &config(40.0, 5));
        assert_eq!(vp.scroll_top, 100.0 * 40.0 - 400.0);
        assert_eq!(vp.end_index, 100);
        assert!(vp.start_index < vp.end_index);
    }

    #[test]
    fn test_negative_scroll_clamps_to_zero() {
        let vp = compute(1000, -50.0, 400.0, &config(40.0, 2));
        assert_eq!(vp.start_index, 0);
        assert_eq!(vp.scroll_top, 0.0);
    }

    #[test]
    fn test_unmeasured_container_passes_through() {
        let vp = compute(1000, 500.0, 0.0, &config(40.0, 5));
        assert!(!vp.virtualized);
        assert_eq!(vp.start_index, 0);
        assert_eq!(vp.end_index, 1000);
        assert_eq!(vp.offset_top, 0.0);
    }

    #[test]
    fn test_small_dataset_passes_through() {
        let vp = compute(50, 200.0, 400.0, &config(40.0, 5));
        assert!(!vp.virtualized);
        assert_eq!(vp.end_index, 50);
    }

    #[test]
    fn test_container_taller_than_content_disables() {
        let vp = compute(60, 0.0, 4000.0, &config(40.0, 5));
        assert!(!vp.virtualized);
        assert_eq!(vp.end_index, 60);
    }
}
