use crate::prelude::{println, *};
use serde::{Deserialize, Serialize};

use hnytools_core::dedupe::Row;
use hnytools_core::query::{
    parse_calculation, parse_filter, parse_relative_time, Calculation, QuerySpecification,
    SortOrder, TimeRange,
};

pub mod client;
pub mod executor;
pub mod run;
pub mod run_all;

// Re-export public data functions
pub use run::run_data;
pub use run_all::run_all_data;

#[derive(Debug, clap::Parser)]
#[command(name = "query")]
#[command(about = "Run analytics queries against a dataset")]
pub struct App {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Run one bounded query and print its rows
    #[clap(name = "run")]
    Run(run::RunOptions),

    /// Page through a query until convergence, merging deduplicated rows
    #[clap(name = "run-all")]
    RunAll(run_all::RunAllOptions),
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    if global.verbose {
        println!("Honeycomb API: {}", global.api_url);
        println!();
    }

    match app.command {
        Commands::Run(options) => run::handler(options, global).await,
        Commands::RunAll(options) => run_all::handler(options, global).await,
    }
}

/// Query arguments shared by `run` and `run-all`
#[derive(Debug, clap::Args, Serialize, Deserialize, Clone)]
pub struct QueryArgs {
    /// Dataset slug to query
    pub dataset: String,

    /// Calculations like COUNT or AVG:duration_ms; the first one is primary
    #[arg(short, long = "calculation", default_value = "COUNT")]
    pub calculations: Vec<String>,

    /// Filters of the form column:op:value (value optional for exists /
    /// does-not-exist)
    #[arg(short, long = "filter")]
    pub filters: Vec<String>,

    /// Breakdown (group-by) columns
    #[arg(short, long = "breakdown")]
    pub breakdowns: Vec<String>,

    /// Relative time range like 30m, 2h or 7d
    #[arg(long, default_value = "2h")]
    pub since: String,

    /// Absolute range start in unix seconds (requires --end, overrides
    /// --since)
    #[arg(long, requires = "end")]
    pub start: Option<i64>,

    /// Absolute range end in unix seconds
    #[arg(long, requires = "start")]
    pub end: Option<i64>,

    /// Time bucket size in seconds
    #[arg(long)]
    pub granularity: Option<u64>,

    /// Sort direction for the primary calculation: ascending or descending
    #[arg(short, long)]
    pub order: Option<String>,
}

impl QueryArgs {
    /// Build the immutable query specification from the parsed flags
    pub fn build_spec(&self) -> Result<QuerySpecification> {
        let time_range = match (self.start, self.end) {
            (Some(start), Some(end)) => {
                if end <= start {
                    return Err(eyre!("--end must be after --start"));
                }
                TimeRange::Absolute { start, end }
            }
            _ => TimeRange::Relative {
                seconds: parse_relative_time(&self.since).map_err(|e| eyre!("{}", e))?,
            },
        };

        let calculations = self
            .calculations
            .iter()
            .map(|raw| parse_calculation(raw).map_err(|e| eyre!("{}", e)))
            .collect::<Result<Vec<Calculation>>>()?;

        let filters = self
            .filters
            .iter()
            .map(|raw| parse_filter(raw).map_err(|e| eyre!("{}", e)))
            .collect::<Result<Vec<_>>>()?;

        let spec = QuerySpecification {
            time_range,
            granularity: self.granularity,
            calculations,
            filters,
            breakdowns: self.breakdowns.clone(),
            order: None,
            limit: None,
            havings: Vec::new(),
        };

        spec.validate().map_err(|e| eyre!("{}", e))?;
        Ok(spec)
    }

    /// Parse the --order flag into the core sort order
    pub fn sort_order(&self) -> Result<Option<SortOrder>> {
        match self.order.as_deref() {
            None => Ok(None),
            Some("ascending") | Some("asc") => Ok(Some(SortOrder::Ascending)),
            Some("descending") | Some("desc") => Ok(Some(SortOrder::Descending)),
            Some(other) => Err(eyre!(
                "Invalid --order '{}': expected ascending or descending",
                other
            )),
        }
    }
}

/// Print rows as a table whose columns are the breakdowns followed by the
/// calculation result columns
pub fn print_rows_table(args: &QueryArgs, rows: &[Row]) {
    if rows.is_empty() {
        println!("No rows.");
        return;
    }

    let mut columns: Vec<String> = args.breakdowns.clone();
    for raw in &args.calculations {
        if let Ok(calc) = parse_calculation(raw) {
            columns.push(calc.result_column());
        }
    }

    let mut table = crate::prelude::new_table();
    table.add_row(prettytable::Row::new(
        columns.iter().map(|c| prettytable::Cell::new(c)).collect(),
    ));

    for row in rows {
        let cells = columns
            .iter()
            .map(|column| prettytable::Cell::new(&render_value(row.get(column))))
            .collect();
        table.add_row(prettytable::Row::new(cells));
    }

    table.printstd();
}

fn render_value(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => "-".to_string(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hnytools_core::query::CalculationOp;

    fn args() -> QueryArgs {
        QueryArgs {
            dataset: "production".to_string(),
            calculations: vec!["COUNT".to_string()],
            filters: Vec::new(),
            breakdowns: Vec::new(),
            since: "2h".to_string(),
            start: None,
            end: None,
            granularity: None,
            order: None,
        }
    }

    #[test]
    fn test_build_spec_defaults_to_relative_count() {
        let spec = args().build_spec().unwrap();
        assert_eq!(spec.time_range, TimeRange::Relative { seconds: 7_200 });
        assert_eq!(spec.calculations[0].op, CalculationOp::Count);
        assert!(spec.order.is_none());
    }

    #[test]
    fn test_build_spec_absolute_range() {
        let mut a = args();
        a.start = Some(100);
        a.end = Some(200);
        let spec = a.build_spec().unwrap();
        assert_eq!(
            spec.time_range,
            TimeRange::Absolute {
                start: 100,
                end: 200
            }
        );
    }

    #[test]
    fn test_build_spec_rejects_inverted_range() {
        let mut a = args();
        a.start = Some(200);
        a.end = Some(100);
        assert!(a.build_spec().is_err());
    }

    #[test]
    fn test_build_spec_rejects_bad_calculation() {
        let mut a = args();
        a.calculations = vec!["AVG".to_string()];
        assert!(a.build_spec().is_err());
    }

    #[test]
    fn test_sort_order_parsing() {
        let mut a = args();
        assert_eq!(a.sort_order().unwrap(), None);
        a.order = Some("desc".to_string());
        assert_eq!(a.sort_order().unwrap(), Some(SortOrder::Descending));
        a.order = Some("sideways".to_string());
        assert!(a.sort_order().is_err());
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(None), "-");
        assert_eq!(render_value(Some(&serde_json::Value::Null)), "-");
        assert_eq!(render_value(Some(&serde_json::json!("api"))), "api");
        assert_eq!(render_value(Some(&serde_json::json!(42))), "42");
    }
}
