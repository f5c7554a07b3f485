//! Paginated query runs with deduplication
//!
//! `run_all` drives the bounded query executor in a strictly sequential loop:
//! fetch a page, dedupe it into the accumulator, report progress, ask the
//! convergence heuristic whether another page is worth it, advance the cursor.
//! The run either returns the full merged row list or fails with no partial
//! result; the only non-exceptional empty result is an empty first page.
//!
//! Cancellation is dropping the returned future. The executor's poll sleep is
//! the only suspension point, so an in-flight page aborts there and nothing
//! is salvaged, consistent with the all-or-raise error policy.

use std::time::Duration;

use crate::prelude::{eprintln, println, *};
use serde::{Deserialize, Serialize};

use hnytools_core::convergence::{should_continue, DEFAULT_DUPLICATE_RATIO_THRESHOLD};
use hnytools_core::cursor::Cursor;
use hnytools_core::dedupe::{dedupe_rows, Row};
use hnytools_core::page::{PaginationState, MAX_ROWS_PER_QUERY};
use hnytools_core::query::{QuerySpecification, SortOrder};

use crate::query::executor::{HoneycombExecutor, QueryExecutor};

/// Default cap on merged rows per run
pub const DEFAULT_MAX_RESULTS: usize = 100_000;

/// Tuning knobs for one paginated run
#[derive(Debug, Clone)]
pub struct PaginationOptions {
    /// Hard cap on the merged result; the run stops once reached
    pub max_results: usize,
    /// When set, pages walk the ordered calculation values instead of time
    /// windows
    pub sort_order: Option<SortOrder>,
    /// Delay between result polls within a page
    pub poll_interval: Duration,
    /// Per-page completion deadline, not a whole-run deadline
    pub timeout: Duration,
    /// Fraction of a page that may be duplicates before the run stops early
    pub duplicate_ratio_threshold: f64,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            sort_order: None,
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(90),
            duplicate_ratio_threshold: DEFAULT_DUPLICATE_RATIO_THRESHOLD,
        }
    }
}

/// Fetch every page of `spec` and merge them into one deduplicated row list.
///
/// `on_page` is called once per completed page with
/// `(pages_fetched, unique_rows_so_far)`, synchronously on the pagination
/// loop, and always before the final cap is applied so it reports true
/// fetched counts. It must not block.
pub async fn run_all<E, F>(
    executor: &E,
    spec: &QuerySpecification,
    options: &PaginationOptions,
    mut on_page: F,
) -> Result<Vec<Row>, Error>
where
    E: QueryExecutor,
    F: FnMut(usize, usize),
{
    // Caller misuse fails before the first fetch.
    if options.max_results == 0 {
        return Err(Error::InvalidArgument(
            "max_results must be greater than zero".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&options.duplicate_ratio_threshold) {
        return Err(Error::InvalidArgument(
            "duplicate_ratio_threshold must be between 0 and 1".to_string(),
        ));
    }
    spec.validate()
        .map_err(|e| Error::QueryValidation(e.to_string()))?;

    let primary = spec
        .primary_calculation()
        .map_err(|e| Error::QueryValidation(e.to_string()))?
        .result_column();

    // One cursor strategy per run: sort-key when an order was requested,
    // time-window otherwise.
    let mut cursor = match options.sort_order.or(spec.order) {
        Some(order) => Cursor::initial_sort_key(order),
        None => Cursor::initial_time_window(spec.time_range, chrono::Utc::now().timestamp()),
    };

    let mut state = PaginationState::new();

    loop {
        let remaining = options.max_results - state.accumulated_rows.len().min(options.max_results);
        let row_limit = remaining.min(MAX_ROWS_PER_QUERY);

        let page = executor
            .execute(
                spec,
                &cursor,
                row_limit,
                options.poll_interval,
                options.timeout,
            )
            .await?;

        let unique = dedupe_rows(&page.rows, &spec.breakdowns, &primary, &mut state.seen_keys);
        let new_count = unique.len();
        let duplicate_count = page.rows.len() - new_count;
        let last_row = page.rows.last().cloned();

        state.record_page(unique, duplicate_count);
        on_page(state.pages_fetched, state.accumulated_rows.len());

        // An empty first page is a legitimately empty result, not an error.
        if state.pages_fetched == 1 && page.row_count == 0 {
            break;
        }

        if !should_continue(
            new_count,
            duplicate_count,
            page.truncated,
            state.accumulated_rows.len(),
            options.max_results,
            options.duplicate_ratio_threshold,
        ) {
            break;
        }

        let Some(last_row) = last_row else { break };
        match cursor.advance(&last_row, &primary) {
            Some(next) => cursor = next,
            // The sort key stopped being numeric; no forward progress is
            // possible.
            None => break,
        }
    }

    let mut rows = state.accumulated_rows;
    rows.truncate(options.max_results);
    Ok(rows)
}

/// Output shape shared by the CLI `--json` mode and the MCP tool
#[derive(Debug, Serialize)]
pub struct RunAllOutput {
    pub dataset: String,
    pub pages_fetched: usize,
    pub total_rows: usize,
    pub rows: Vec<Row>,
}

/// Public data function - used by both CLI and MCP
pub async fn run_all_data(
    global: &crate::Global,
    dataset: String,
    spec: QuerySpecification,
    options: PaginationOptions,
    on_page: impl FnMut(usize, usize),
) -> Result<RunAllOutput> {
    let config = crate::api::HoneycombConfig::from_global(global).map_err(|e| eyre!("{}", e))?;
    let executor =
        HoneycombExecutor::new(config, dataset.clone()).map_err(|e| eyre!("{}", e))?;

    let mut pages_fetched = 0;
    let mut on_page = on_page;
    let rows = run_all(&executor, &spec, &options, |page, total| {
        pages_fetched = page;
        on_page(page, total);
    })
    .await
    .map_err(|e| eyre!("{}", e))?;

    Ok(RunAllOutput {
        dataset,
        pages_fetched,
        total_rows: rows.len(),
        rows,
    })
}

/// Options for paginating a query to completion
#[derive(Debug, clap::Args, Serialize, Deserialize, Clone)]
#[command(after_help = "EXAMPLES:
  # Count events per service over the last two hours, merged across pages:
  hnytools query run-all production --breakdown service

  # Slowest endpoints by P99, walking the sort order until convergence:
  hnytools query run-all production \\
    --calculation P99:duration_ms --breakdown endpoint --order descending

  # Bound the merged result and loosen the duplicate heuristic:
  hnytools query run-all production --breakdown user_id \\
    --max-results 25000 --duplicate-threshold 0.8

NOTES:
  - Pages are fetched sequentially; each page's cursor depends on the last
  - Rows are deduplicated by breakdown values plus the primary calculation
  - The run stops early once a page is mostly already-seen rows
  - --timeout bounds one page, not the whole run")]
pub struct RunAllOptions {
    #[clap(flatten)]
    pub query: super::QueryArgs,

    /// Maximum number of merged rows to return
    #[arg(long, default_value_t = DEFAULT_MAX_RESULTS)]
    pub max_results: usize,

    /// Seconds between result polls
    #[arg(long, default_value = "1.0")]
    pub poll_interval: f64,

    /// Seconds to wait for a single page to complete
    #[arg(long, default_value = "90.0")]
    pub timeout: f64,

    /// Duplicate fraction of a page at which pagination stops early
    #[arg(long, default_value_t = DEFAULT_DUPLICATE_RATIO_THRESHOLD)]
    pub duplicate_threshold: f64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Handle the run-all command
pub async fn handler(options: RunAllOptions, global: crate::Global) -> Result<()> {
    let spec = options.query.build_spec()?;

    let pagination = PaginationOptions {
        max_results: options.max_results,
        sort_order: options.query.sort_order()?,
        poll_interval: Duration::from_secs_f64(options.poll_interval),
        timeout: Duration::from_secs_f64(options.timeout),
        duplicate_ratio_threshold: options.duplicate_threshold,
    };

    let progress = if options.json {
        None
    } else {
        let bar = indicatif::ProgressBar::new_spinner();
        bar.enable_steady_tick(Duration::from_millis(120));
        Some(bar)
    };

    let data = run_all_data(
        &global,
        options.query.dataset.clone(),
        spec,
        pagination,
        |page, total| {
            if let Some(bar) = &progress {
                bar.set_message(f!("page {page}: {total} unique rows"));
            }
        },
    )
    .await;

    if let Some(bar) = &progress {
        bar.finish_and_clear();
    }
    let data = data?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        super::print_rows_table(&options.query, &data.rows);
        eprintln!(
            "\n{} row(s) across {} page(s)",
            data.total_rows, data.pages_fetched
        );
    }

    Ok(())
}
