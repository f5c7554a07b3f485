//! Smart-stopping heuristic for pagination
//!
//! Decides after each page whether further fetching is worthwhile. A page
//! dominated by already-seen rows means the cursor has stopped making forward
//! progress, which happens when a sort-key cursor converges on ties at a
//! single calculation value shared by more rows than fit in one page. This is
//! a heuristic that bounds work against duplicate-heavy tails; it is not a
//! completeness guarantee.

/// Fraction of a page that may be duplicates before pagination gives up
pub const DEFAULT_DUPLICATE_RATIO_THRESHOLD: f64 = 0.5;

/// Decide whether to fetch another page.
///
/// Stops when the result cap is reached, when the last page was not truncated
/// (the cursor range is fully drained), or when at least
/// `duplicate_ratio_threshold` of the last page was already-seen rows.
pub fn should_continue(
    new_rows_this_page: usize,
    duplicate_rows_this_page: usize,
    page_was_truncated: bool,
    rows_so_far: usize,
    max_results: usize,
    duplicate_ratio_threshold: f64,
) -> bool {
    if rows_so_far >= max_results {
        return false;
    }

    if !page_was_truncated {
        return false;
    }

    let total = new_rows_this_page + duplicate_rows_this_page;
    let duplicate_ratio = if total == 0 {
        0.0
    } else {
        duplicate_rows_this_page as f64 / total as f64
    };

    duplicate_ratio < duplicate_ratio_threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = DEFAULT_DUPLICATE_RATIO_THRESHOLD;

    #[test]
    fn test_continues_on_truncated_page_with_fresh_rows() {
        assert!(should_continue(10_000, 0, true, 10_000, 100_000, THRESHOLD));
    }

    #[test]
    fn test_stops_when_cap_reached() {
        assert!(!should_continue(10_000, 0, true, 100_000, 100_000, THRESHOLD));
    }

    #[test]
    fn test_stops_when_cap_exceeded() {
        // The cap check dominates every other signal.
        assert!(!should_continue(200, 0, true, 200, 50, THRESHOLD));
    }

    #[test]
    fn test_cap_check_dominates_for_all_inputs() {
        for new in [0usize, 1, 50, 10_000] {
            for dup in [0usize, 1, 50] {
                for truncated in [true, false] {
                    assert!(!should_continue(new, dup, truncated, 75, 75, THRESHOLD));
                }
            }
        }
    }

    #[test]
    fn test_stops_on_non_truncated_page() {
        assert!(!should_continue(3, 0, false, 3, 100_000, THRESHOLD));
    }

    #[test]
    fn test_stops_on_duplicate_ratio_at_threshold() {
        // 50 of 100 rows were duplicates: ratio == threshold, stop.
        assert!(!should_continue(50, 50, true, 500, 100_000, THRESHOLD));
    }

    #[test]
    fn test_stops_on_duplicate_ratio_above_threshold() {
        assert!(!should_continue(40, 60, true, 500, 100_000, THRESHOLD));
    }

    #[test]
    fn test_continues_below_threshold() {
        assert!(should_continue(60, 40, true, 500, 100_000, THRESHOLD));
    }

    #[test]
    fn test_empty_truncated_page_counts_as_ratio_zero() {
        assert!(should_continue(0, 0, true, 10, 100_000, THRESHOLD));
    }

    #[test]
    fn test_threshold_is_configurable() {
        // A stricter threshold stops on a page that the default would accept.
        assert!(should_continue(80, 20, true, 100, 100_000, THRESHOLD));
        assert!(!should_continue(80, 20, true, 100, 100_000, 0.2));
    }
}
