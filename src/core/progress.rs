//! Pure numeric helpers for the progress pipeline.

/// Percentage of a book read, rounded to the nearest integer and bounded to
/// `0..=100`. A declared length of zero pages yields 0 rather than an error;
/// a current page beyond the declared length caps at 100.
pub fn calculate_progress(current_page: u32, total_page: u32) -> u8 {
    if total_page == 0 {
        return 0;
    }
    let ratio = (current_page as f64 / total_page as f64) * 100.0;
    ratio.round().clamp(0.0, 100.0) as u8
}

/// Bounds `page` to `[min, max]`. Total: when `min > max` the result is
/// `max`, matching `min(max, max(min, page))`.
pub fn clamp_page<T: Ord>(page: T, min: T, max: T) -> T {
    page.max(min).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_plain_values() {
        assert_eq!(calculate_progress(120, 350), 34);
        assert_eq!(calculate_progress(50, 280), 18);
        assert_eq!(calculate_progress(0, 100), 0);
        assert_eq!(calculate_progress(100, 100), 100);
    }

    #[test]
    fn test_progress_rounds_half_up() {
        // 0.5% and 99.5% both round away from zero.
        assert_eq!(calculate_progress(1, 200), 1);
        assert_eq!(calculate_progress(199, 200), 100);
        assert_eq!(calculate_progress(1, 3), 33);
        assert_eq!(calculate_progress(2, 3), 67);
    }

    #[test]
    fn test_progress_zero_total_is_zero() {
        assert_eq!(calculate_progress(0, 0), 0);
        assert_eq!(calculate_progress(42, 0), 0);
    }

    #[test]
    fn test_progress_caps_at_100() {
        assert_eq!(calculate_progress(250, 200), 100);
        assert_eq!(calculate_progress(u32::MAX, 1), 100);
    }

    #[test]
    fn test_progress_stays_in_range() {
        for current in [0u32, 1, 7, 99, 100, 350, 1000] {
            for total in [1u32, 3, 99, 100, 350] {
                let progress = calculate_progress(current, total);
                assert!(progress <= 100, "{current}/{total} gave {progress}");
            }
        }
    }

    #[test]
    fn test_clamp_page_bounds() {
        assert_eq!(clamp_page(5, 0, 10), 5);
        assert_eq!(clamp_page(-3, 0, 10), 0);
        assert_eq!(clamp_page(15, 0, 10), 10);
        assert_eq!(clamp_page(0, 0, 0), 0);
    }

    #[test]
    fn test_clamp_page_idempotent() {
        for page in [-50i64, -1, 0, 3, 10, 11, 999] {
            let once = clamp_page(page, 0, 10);
            assert_eq!(clamp_page(once, 0, 10), once);
            assert!((0..=10).contains(&once));
        }
    }

    #[test]
    fn test_clamp_page_inverted_bounds_yield_max() {
        assert_eq!(clamp_page(5, 10, 0), 0);
    }
}
