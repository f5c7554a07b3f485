use std::time::Duration;

use crate::prelude::{eprintln, *};
use serde::Deserialize;

use super::{CallToolResult, Content, JsonRpcError};
use crate::query::run_all::PaginationOptions;
use crate::query::QueryArgs;

/// Arguments shared by both query tools
#[derive(Debug, Deserialize)]
struct QueryToolArgs {
    dataset: String,
    calculations: Option<Vec<String>>,
    filters: Option<Vec<String>>,
    breakdowns: Option<Vec<String>>,
    since: Option<String>,
    order: Option<String>,
    max_results: Option<usize>,
}

impl QueryToolArgs {
    fn parse(arguments: Option<serde_json::Value>) -> Result<Self, JsonRpcError> {
        serde_json::from_value(arguments.unwrap_or(serde_json::Value::Null)).map_err(|e| {
            JsonRpcError {
                code: -32602,
                message: format!("Invalid arguments: {e}"),
                data: None,
            }
        })
    }

    /// The CLI argument struct is the single source of spec-building logic;
    /// tool calls go through it too.
    fn to_query_args(&self) -> QueryArgs {
        QueryArgs {
            dataset: self.dataset.clone(),
            calculations: self
                .calculations
                .clone()
                .unwrap_or_else(|| vec!["COUNT".to_string()]),
            filters: self.filters.clone().unwrap_or_default(),
            breakdowns: self.breakdowns.clone().unwrap_or_default(),
            since: self.since.clone().unwrap_or_else(|| "2h".to_string()),
            start: None,
            end: None,
            granularity: None,
            order: self.order.clone(),
        }
    }
}

fn invalid_arguments(e: impl std::fmt::Display) -> JsonRpcError {
    JsonRpcError {
        code: -32602,
        message: format!("Invalid arguments: {e}"),
        data: None,
    }
}

fn execution_error(e: impl std::fmt::Display) -> JsonRpcError {
    JsonRpcError {
        code: -32603,
        message: format!("Tool execution error: {e}"),
        data: None,
    }
}

fn to_tool_result(data: impl serde::Serialize) -> Result<serde_json::Value, JsonRpcError> {
    let json_string = serde_json::to_string_pretty(&data).map_err(|e| JsonRpcError {
        code: -32603,
        message: format!("Serialization error: {e}"),
        data: None,
    })?;

    let result = CallToolResult {
        content: vec![Content::Text { text: json_string }],
        is_error: None,
    };

    serde_json::to_value(result).map_err(|e| JsonRpcError {
        code: -32603,
        message: format!("Internal error: {e}"),
        data: None,
    })
}

pub async fn handle_query_run(
    arguments: Option<serde_json::Value>,
    global: &crate::Global,
) -> Result<serde_json::Value, JsonRpcError> {
    let args = QueryToolArgs::parse(arguments)?;
    let query_args = args.to_query_args();
    let spec = query_args.build_spec().map_err(invalid_arguments)?;
    let sort_order = query_args.sort_order().map_err(invalid_arguments)?;

    if global.verbose {
        eprintln!("Calling query_run: dataset={}", args.dataset);
    }

    let data = crate::query::run_data(
        global,
        args.dataset,
        spec,
        sort_order,
        1_000,
        Duration::from_secs(1),
        Duration::from_secs(90),
    )
    .await
    .map_err(execution_error)?;

    to_tool_result(data)
}

pub async fn handle_query_run_all(
    arguments: Option<serde_json::Value>,
    global: &crate::Global,
) -> Result<serde_json::Value, JsonRpcError> {
    let args = QueryToolArgs::parse(arguments)?;
    let query_args = args.to_query_args();
    let spec = query_args.build_spec().map_err(invalid_arguments)?;
    let sort_order = query_args.sort_order().map_err(invalid_arguments)?;

    if global.verbose {
        eprintln!(
            "Calling query_run_all: dataset={}, max_results={:?}",
            args.dataset, args.max_results
        );
    }

    let options = PaginationOptions {
        sort_order,
        max_results: args
            .max_results
            .unwrap_or(crate::query::run_all::DEFAULT_MAX_RESULTS),
        ..PaginationOptions::default()
    };

    let data = crate::query::run_all_data(global, args.dataset, spec, options, |_, _| {})
        .await
        .map_err(execution_error)?;

    to_tool_result(data)
}
