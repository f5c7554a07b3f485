//! Page results and per-run pagination bookkeeping

use std::collections::HashSet;

use serde::Serialize;

use crate::dedupe::{Row, RowKey};

/// Hard backend cap on rows returned by a single query. Requests beyond it
/// are clamped, never rejected.
pub const MAX_ROWS_PER_QUERY: usize = 10_000;

/// One page of results as reported by the bounded query executor
#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    pub rows: Vec<Row>,
    pub row_count: usize,
    /// The backend capped this page; more matching data likely exists
    pub truncated: bool,
}

/// Mutable state of one pagination run. Created when a run starts, owned
/// exclusively by the pagination loop, discarded when the run returns or
/// fails. Nothing here survives across runs.
#[derive(Debug, Default)]
pub struct PaginationState {
    pub seen_keys: HashSet<RowKey>,
    pub accumulated_rows: Vec<Row>,
    pub pages_fetched: usize,
    pub total_new_rows: usize,
    pub total_duplicate_rows: usize,
}

impl PaginationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one deduplicated page into the run totals
    pub fn record_page(&mut self, unique_rows: Vec<Row>, duplicate_rows: usize) {
        self.pages_fetched += 1;
        self.total_new_rows += unique_rows.len();
        self.total_duplicate_rows += duplicate_rows;
        self.accumulated_rows.extend(unique_rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(service: &str) -> Row {
        let mut row = Row::new();
        row.insert("service".to_string(), serde_json::json!(service));
        row
    }

    #[test]
    fn test_record_page_accumulates_counts() {
        let mut state = PaginationState::new();

        state.record_page(vec![row("api"), row("worker")], 1);
        state.record_page(vec![row("cron")], 4);

        assert_eq!(state.pages_fetched, 2);
        assert_eq!(state.total_new_rows, 3);
        assert_eq!(state.total_duplicate_rows, 5);
        assert_eq!(state.accumulated_rows.len(), 3);
    }

    #[test]
    fn test_record_empty_page_still_counts_the_page() {
        let mut state = PaginationState::new();
        state.record_page(Vec::new(), 0);
        assert_eq!(state.pages_fetched, 1);
        assert!(state.accumulated_rows.is_empty());
    }
}
