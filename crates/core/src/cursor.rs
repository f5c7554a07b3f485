//! Pagination cursors and their advancement rules
//!
//! A pagination run holds exactly one cursor: either a time window that walks
//! backward through the query range, or a sort-key marker that walks down the
//! ordered calculation values. The two strategies are never mixed within a
//! run. All functions here are pure; the shell applies the resulting
//! specification to the wire.

use crate::dedupe::Row;
use crate::query::{
    Calculation, FilterOp, Having, QuerySpecError, QuerySpecification, SortOrder, TimeRange,
};

/// The paging position for one run
#[derive(Debug, Clone, PartialEq)]
pub enum Cursor {
    /// Unix-second window, end exclusive; advanced by shifting backward
    TimeWindow { start: i64, end: i64 },
    /// Server-side ordering by the primary calculation; `marker` is the last
    /// seen calculation value, `None` before the first page
    SortKey { order: SortOrder, marker: Option<f64> },
}

impl Cursor {
    /// Initial time-window cursor covering the whole query range. Relative
    /// ranges resolve against `now` once, at the start of the run, so every
    /// window of the run shares the same reference point.
    pub fn initial_time_window(time_range: TimeRange, now: i64) -> Cursor {
        match time_range {
            TimeRange::Absolute { start, end } => Cursor::TimeWindow { start, end },
            TimeRange::Relative { seconds } => Cursor::TimeWindow {
                start: now - seconds,
                end: now,
            },
        }
    }

    /// Initial sort-key cursor with no marker
    pub fn initial_sort_key(order: SortOrder) -> Cursor {
        Cursor::SortKey {
            order,
            marker: None,
        }
    }

    /// Advance past the page whose last row is `last_row`.
    ///
    /// A time window shifts backward by its own span, so consecutive windows
    /// touch but never overlap. A sort-key cursor takes the last row's
    /// primary-calculation value as the new marker; the next page then
    /// requests rows strictly past it, accepting that ties at the boundary
    /// may be skipped (the dedup layer catches ties that span pages).
    ///
    /// Returns `None` when the sort-key value is missing or non-numeric, in
    /// which case the cursor cannot make progress and paging must stop.
    pub fn advance(&self, last_row: &Row, primary_calculation: &str) -> Option<Cursor> {
        match self {
            Cursor::TimeWindow { start, end } => {
                let span = end - start;
                Some(Cursor::TimeWindow {
                    start: start - span,
                    end: *start,
                })
            }
            Cursor::SortKey { order, .. } => {
                let value = last_row.get(primary_calculation)?.as_f64()?;
                Some(Cursor::SortKey {
                    order: *order,
                    marker: Some(value),
                })
            }
        }
    }
}

/// Derive the specification for one page: the base spec with the cursor and
/// row limit applied.
///
/// A time-window cursor replaces the time range. A sort-key cursor pins the
/// sort order and, once a marker exists, adds a having-clause on the primary
/// calculation that admits only rows strictly past the marker.
pub fn page_query(
    spec: &QuerySpecification,
    cursor: &Cursor,
    row_limit: usize,
) -> Result<QuerySpecification, QuerySpecError> {
    let primary: Calculation = spec.primary_calculation()?.clone();
    let mut page = spec.clone();
    page.limit = Some(row_limit);

    match cursor {
        Cursor::TimeWindow { start, end } => {
            page.time_range = TimeRange::Absolute {
                start: *start,
                end: *end,
            };
        }
        Cursor::SortKey { order, marker } => {
            page.order = Some(*order);
            if let Some(marker) = marker {
                let op = match order {
                    SortOrder::Ascending => FilterOp::Gt,
                    SortOrder::Descending => FilterOp::Lt,
                };
                page.havings.push(Having {
                    calculate_op: primary.op,
                    column: primary.column.clone(),
                    op,
                    value: serde_json::json!(marker),
                });
            }
        }
    }

    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::CalculationOp;

    fn spec() -> QuerySpecification {
        QuerySpecification::count(TimeRange::Relative { seconds: 7_200 })
    }

    fn count_row(count: i64) -> Row {
        let mut row = Row::new();
        row.insert("COUNT".to_string(), serde_json::json!(count));
        row
    }

    #[test]
    fn test_initial_window_resolves_relative_range() {
        let cursor = Cursor::initial_time_window(TimeRange::Relative { seconds: 3_600 }, 10_000);
        assert_eq!(
            cursor,
            Cursor::TimeWindow {
                start: 6_400,
                end: 10_000
            }
        );
    }

    #[test]
    fn test_initial_window_keeps_absolute_range() {
        let cursor = Cursor::initial_time_window(
            TimeRange::Absolute {
                start: 100,
                end: 200,
            },
            999,
        );
        assert_eq!(
            cursor,
            Cursor::TimeWindow {
                start: 100,
                end: 200
            }
        );
    }

    #[test]
    fn test_time_window_advances_backward_without_overlap() {
        let mut cursor = Cursor::TimeWindow {
            start: 6_400,
            end: 10_000,
        };
        let row = count_row(1);

        let mut windows = vec![(6_400, 10_000)];
        for _ in 0..3 {
            cursor = cursor.advance(&row, "COUNT").unwrap();
            match cursor {
                Cursor::TimeWindow { start, end } => windows.push((start, end)),
                _ => unreachable!(),
            }
        }

        // Consecutive windows touch but never overlap.
        for pair in windows.windows(2) {
            assert_eq!(pair[1].1, pair[0].0);
            assert!(pair[1].0 < pair[1].1);
        }
    }

    #[test]
    fn test_sort_key_marker_takes_last_row_value() {
        let cursor = Cursor::initial_sort_key(SortOrder::Descending);
        let advanced = cursor.advance(&count_row(42), "COUNT").unwrap();
        assert_eq!(
            advanced,
            Cursor::SortKey {
                order: SortOrder::Descending,
                marker: Some(42.0)
            }
        );
    }

    #[test]
    fn test_sort_key_advance_fails_without_numeric_value() {
        let cursor = Cursor::initial_sort_key(SortOrder::Descending);
        let mut row = Row::new();
        row.insert("COUNT".to_string(), serde_json::json!("not-a-number"));
        assert!(cursor.advance(&row, "COUNT").is_none());
        assert!(cursor.advance(&Row::new(), "COUNT").is_none());
    }

    #[test]
    fn test_page_query_applies_time_window() {
        let cursor = Cursor::TimeWindow {
            start: 100,
            end: 200,
        };
        let page = page_query(&spec(), &cursor, 5_000).unwrap();
        assert_eq!(
            page.time_range,
            TimeRange::Absolute {
                start: 100,
                end: 200
            }
        );
        assert_eq!(page.limit, Some(5_000));
        assert!(page.havings.is_empty());
    }

    #[test]
    fn test_page_query_first_sort_page_has_no_having() {
        let cursor = Cursor::initial_sort_key(SortOrder::Descending);
        let page = page_query(&spec(), &cursor, 1_000).unwrap();
        assert_eq!(page.order, Some(SortOrder::Descending));
        assert!(page.havings.is_empty());
    }

    #[test]
    fn test_page_query_sort_marker_becomes_strict_having() {
        let cursor = Cursor::SortKey {
            order: SortOrder::Descending,
            marker: Some(42.0),
        };
        let page = page_query(&spec(), &cursor, 1_000).unwrap();
        assert_eq!(page.havings.len(), 1);
        let having = &page.havings[0];
        assert_eq!(having.calculate_op, CalculationOp::Count);
        assert_eq!(having.op, FilterOp::Lt);
        assert_eq!(having.value, serde_json::json!(42.0));
    }

    #[test]
    fn test_page_query_ascending_marker_uses_greater_than() {
        let cursor = Cursor::SortKey {
            order: SortOrder::Ascending,
            marker: Some(7.0),
        };
        let page = page_query(&spec(), &cursor, 1_000).unwrap();
        assert_eq!(page.havings[0].op, FilterOp::Gt);
    }
}
