mod query;

use serde::{Deserialize, Serialize};

// Re-export types needed by tool handlers
pub use super::{JsonRpcError, Tool};

// MCP Protocol types for tools
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ServerCapabilities {
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Serialize)]
pub struct ToolsCapability {}

#[derive(Debug, Serialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

#[derive(Debug, Serialize)]
pub struct ToolsList {
    pub tools: Vec<Tool>,
}

#[derive(Debug, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    pub arguments: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct CallToolResult {
    pub content: Vec<Content>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum Content {
    #[serde(rename = "text")]
    Text { text: String },
}

pub fn handle_initialize() -> Result<serde_json::Value, JsonRpcError> {
    let result = InitializeResult {
        protocol_version: "2024-11-05".to_string(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability {}),
        },
        server_info: ServerInfo {
            name: "hnytools".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    };

    serde_json::to_value(result).map_err(|e| JsonRpcError {
        code: -32603,
        message: format!("Internal error: {e}"),
        data: None,
    })
}

pub fn handle_tools_list() -> Result<serde_json::Value, JsonRpcError> {
    let query_properties = serde_json::json!({
        "dataset": {
            "type": "string",
            "description": "Dataset slug to query"
        },
        "calculations": {
            "type": "array",
            "items": { "type": "string" },
            "description": "Calculations like 'COUNT' or 'AVG:duration_ms'; the first one is primary (default: ['COUNT'])"
        },
        "filters": {
            "type": "array",
            "items": { "type": "string" },
            "description": "Filters of the form 'column:op:value', e.g. 'status_code:>=:500' or 'trace.parent_id:does-not-exist'"
        },
        "breakdowns": {
            "type": "array",
            "items": { "type": "string" },
            "description": "Columns to group results by"
        },
        "since": {
            "type": "string",
            "description": "Relative time range like '30m', '2h' or '7d' (default: '2h')"
        },
        "order": {
            "type": "string",
            "description": "Sort direction for the primary calculation: 'ascending' or 'descending'"
        }
    });

    let mut run_all_properties = query_properties
        .as_object()
        .cloned()
        .unwrap_or_default();
    run_all_properties.insert(
        "max_results".to_string(),
        serde_json::json!({
            "type": "number",
            "description": "Cap on merged rows across all pages (default: 100000)"
        }),
    );

    let tools = vec![
        Tool {
            name: "query_run".to_string(),
            description: "Run one bounded analytics query against a Honeycomb dataset and return its rows. A single query returns at most 10,000 rows; the response's 'truncated' flag signals the backend capped the page. Requires HONEYCOMB_API_KEY.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": query_properties,
                "required": ["dataset"]
            }),
        },
        Tool {
            name: "query_run_all".to_string(),
            description: "Page through a Honeycomb analytics query until convergence, merging every page into one deduplicated row list. Rows are deduplicated by their breakdown values plus the primary calculation result, and pagination stops early once a page is mostly already-seen rows. Requires HONEYCOMB_API_KEY.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": run_all_properties,
                "required": ["dataset"]
            }),
        },
    ];

    let result = ToolsList { tools };

    serde_json::to_value(result).map_err(|e| JsonRpcError {
        code: -32603,
        message: format!("Internal error: {e}"),
        data: None,
    })
}

pub async fn handle_tools_call(
    params: Option<serde_json::Value>,
    global: &crate::Global,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: CallToolParams = serde_json::from_value(params.unwrap_or(serde_json::Value::Null))
        .map_err(|e| JsonRpcError {
            code: -32602,
            message: format!("Invalid params: {e}"),
            data: None,
        })?;

    match params.name.as_str() {
        "query_run" => query::handle_query_run(params.arguments, global).await,
        "query_run_all" => query::handle_query_run_all(params.arguments, global).await,
        name => Err(JsonRpcError {
            code: -32602,
            message: format!("Unknown tool: {name}"),
            data: None,
        }),
    }
}
