use std::time::Duration;

use crate::prelude::{eprintln, println, *};
use serde::{Deserialize, Serialize};

use hnytools_core::cursor::Cursor;
use hnytools_core::dedupe::Row;
use hnytools_core::query::{QuerySpecification, SortOrder};

use crate::query::executor::{HoneycombExecutor, QueryExecutor};

/// Options for running a single bounded query
#[derive(Debug, clap::Args, Serialize, Deserialize, Clone)]
#[command(after_help = "EXAMPLES:
  # Count events per service over the last two hours:
  hnytools query run production --breakdown service

  # P99 latency per endpoint, slowest first:
  hnytools query run production \\
    --calculation P99:duration_ms --breakdown endpoint --order descending

  # Errors only, over an absolute window:
  hnytools query run production --filter status_code:>=:500 \\
    --start 1756137600 --end 1756141200

NOTES:
  - A single query returns at most 10,000 rows; use run-all to merge more
  - The truncation notice on stderr means the backend capped this page")]
pub struct RunOptions {
    #[clap(flatten)]
    pub query: super::QueryArgs,

    /// Maximum number of rows to return
    #[arg(short, long, default_value = "1000")]
    pub limit: usize,

    /// Seconds between result polls
    #[arg(long, default_value = "1.0")]
    pub poll_interval: f64,

    /// Seconds to wait for the query to complete
    #[arg(long, default_value = "90.0")]
    pub timeout: f64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Output of one bounded query
#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub dataset: String,
    pub row_count: usize,
    /// The backend capped this page; more matching data likely exists
    pub truncated: bool,
    pub rows: Vec<Row>,
}

/// Public data function - used by both CLI and MCP
pub async fn run_data(
    global: &crate::Global,
    dataset: String,
    spec: QuerySpecification,
    sort_order: Option<SortOrder>,
    limit: usize,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<RunOutput> {
    let config = crate::api::HoneycombConfig::from_global(global).map_err(|e| eyre!("{}", e))?;
    let executor =
        HoneycombExecutor::new(config, dataset.clone()).map_err(|e| eyre!("{}", e))?;

    let cursor = match sort_order.or(spec.order) {
        Some(order) => Cursor::initial_sort_key(order),
        None => Cursor::initial_time_window(spec.time_range, chrono::Utc::now().timestamp()),
    };

    let page = executor
        .execute(&spec, &cursor, limit, poll_interval, timeout)
        .await
        .map_err(|e| eyre!("{}", e))?;

    Ok(RunOutput {
        dataset,
        row_count: page.row_count,
        truncated: page.truncated,
        rows: page.rows,
    })
}

/// Handle the run command
pub async fn handler(options: RunOptions, global: crate::Global) -> Result<()> {
    let spec = options.query.build_spec()?;
    let sort_order = options.query.sort_order()?;

    if options.limit == 0 {
        return Err(eyre!("--limit must be greater than zero"));
    }

    let data = run_data(
        &global,
        options.query.dataset.clone(),
        spec,
        sort_order,
        options.limit,
        Duration::from_secs_f64(options.poll_interval),
        Duration::from_secs_f64(options.timeout),
    )
    .await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        super::print_rows_table(&options.query, &data.rows);
        if data.truncated {
            use colored::*;
            eprintln!();
            eprintln!(
                "{}",
                f!(
                    " ⚠️  Result was capped at {} row(s); more matching data likely exists. ",
                    data.row_count
                )
                .black()
                .on_yellow()
                .bold()
            );
            eprintln!(
                "{}",
                " Use `hnytools query run-all` to merge every page. "
                    .black()
                    .on_yellow()
                    .bold()
            );
            eprintln!();
        }
    }

    Ok(())
}
