//! Query-data endpoints
//!
//! Wire-level calls for the asynchronous query flow: create a query, kick off
//! a query result, poll it until done. The JSON body shape lives here and
//! nowhere else; the engine above deals only in [`QuerySpecification`] and
//! [`PageResult`](hnytools_core::page::PageResult).

use serde::Deserialize;

use hnytools_core::dedupe::Row;
use hnytools_core::query::{QuerySpecification, TimeRange};

use crate::api::{api_error, send_with_retry, HoneycombConfig};
use crate::error::Error;

#[derive(Debug, Deserialize)]
struct CreateQueryResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreateQueryResultResponse {
    id: String,
}

/// Poll response for an asynchronous query result
#[derive(Debug, Deserialize)]
pub struct QueryResultResponse {
    pub complete: bool,
    #[serde(default)]
    pub data: QueryResultData,
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryResultData {
    #[serde(default)]
    pub results: Vec<QueryResultEntry>,
}

#[derive(Debug, Deserialize)]
pub struct QueryResultEntry {
    pub data: Row,
}

/// Serialize a specification into the query-create body. Orders reference the
/// primary calculation; relative ranges go out as a `time_range` in seconds,
/// absolute ones as explicit bounds.
pub fn query_body(spec: &QuerySpecification) -> serde_json::Value {
    let mut body = serde_json::Map::new();

    match spec.time_range {
        TimeRange::Relative { seconds } => {
            body.insert("time_range".to_string(), serde_json::json!(seconds));
        }
        TimeRange::Absolute { start, end } => {
            body.insert("start_time".to_string(), serde_json::json!(start));
            body.insert("end_time".to_string(), serde_json::json!(end));
        }
    }

    if let Some(granularity) = spec.granularity {
        body.insert("granularity".to_string(), serde_json::json!(granularity));
    }

    body.insert(
        "calculations".to_string(),
        serde_json::json!(spec.calculations),
    );

    if !spec.filters.is_empty() {
        body.insert("filters".to_string(), serde_json::json!(spec.filters));
    }
    if !spec.breakdowns.is_empty() {
        body.insert("breakdowns".to_string(), serde_json::json!(spec.breakdowns));
    }
    if !spec.havings.is_empty() {
        body.insert("havings".to_string(), serde_json::json!(spec.havings));
    }

    if let (Some(order), Ok(primary)) = (spec.order, spec.primary_calculation()) {
        body.insert(
            "orders".to_string(),
            serde_json::json!([{
                "op": primary.op,
                "column": primary.column,
                "order": order,
            }]),
        );
    }

    if let Some(limit) = spec.limit {
        body.insert("limit".to_string(), serde_json::json!(limit));
    }

    serde_json::Value::Object(body)
}

/// Classify a failed create call. Only genuine spec rejections become the
/// validation variant; rate limits that outlive the retry loop, missing
/// datasets, and server errors stay API errors.
fn creation_error(status: u16, message: String) -> Error {
    match status {
        400 | 422 => Error::QueryValidation(message),
        _ => Error::Api { status, message },
    }
}

/// POST /1/queries/{dataset} - register the query, returning its id
pub async fn create_query(
    client: &reqwest::Client,
    config: &HoneycombConfig,
    dataset: &str,
    spec: &QuerySpecification,
) -> Result<String, Error> {
    let url = format!(
        "{}/1/queries/{}",
        config.base_url,
        urlencoding::encode(dataset)
    );

    let response = send_with_retry(client.post(&url).json(&query_body(spec))).await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(creation_error(status.as_u16(), message));
    }

    let created: CreateQueryResponse = response
        .json()
        .await
        .map_err(|e| Error::Generic(format!("Failed to parse query response: {}", e)))?;

    Ok(created.id)
}

/// POST /1/query_results/{dataset} - start executing a registered query
pub async fn create_query_result(
    client: &reqwest::Client,
    config: &HoneycombConfig,
    dataset: &str,
    query_id: &str,
) -> Result<String, Error> {
    let url = format!(
        "{}/1/query_results/{}",
        config.base_url,
        urlencoding::encode(dataset)
    );

    let body = serde_json::json!({
        "query_id": query_id,
        "disable_series": true,
    });

    let response = send_with_retry(client.post(&url).json(&body)).await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(creation_error(status.as_u16(), message));
    }

    let created: CreateQueryResultResponse = response
        .json()
        .await
        .map_err(|e| Error::Generic(format!("Failed to parse query result response: {}", e)))?;

    Ok(created.id)
}

/// GET /1/query_results/{dataset}/{id} - one poll of the running query
pub async fn get_query_result(
    client: &reqwest::Client,
    config: &HoneycombConfig,
    dataset: &str,
    result_id: &str,
) -> Result<QueryResultResponse, Error> {
    let url = format!(
        "{}/1/query_results/{}/{}",
        config.base_url,
        urlencoding::encode(dataset),
        result_id
    );

    let response = send_with_retry(client.get(&url)).await?;

    if !response.status().is_success() {
        return Err(api_error(response).await);
    }

    response
        .json()
        .await
        .map_err(|e| Error::Generic(format!("Failed to parse poll response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hnytools_core::query::{parse_calculation, parse_filter, SortOrder};

    fn spec() -> QuerySpecification {
        let mut spec = QuerySpecification::count(TimeRange::Relative { seconds: 7_200 });
        spec.breakdowns = vec!["service".to_string()];
        spec
    }

    #[test]
    fn test_body_relative_range() {
        let body = query_body(&spec());
        assert_eq!(body["time_range"], serde_json::json!(7_200));
        assert!(body.get("start_time").is_none());
        assert_eq!(body["calculations"], serde_json::json!([{"op": "COUNT"}]));
        assert_eq!(body["breakdowns"], serde_json::json!(["service"]));
    }

    #[test]
    fn test_body_absolute_range() {
        let mut spec = spec();
        spec.time_range = TimeRange::Absolute {
            start: 100,
            end: 200,
        };
        let body = query_body(&spec);
        assert_eq!(body["start_time"], serde_json::json!(100));
        assert_eq!(body["end_time"], serde_json::json!(200));
        assert!(body.get("time_range").is_none());
    }

    #[test]
    fn test_body_orders_reference_primary_calculation() {
        let mut spec = spec();
        spec.calculations = vec![parse_calculation("P99:duration_ms").unwrap()];
        spec.order = Some(SortOrder::Descending);
        let body = query_body(&spec);
        assert_eq!(
            body["orders"],
            serde_json::json!([{
                "op": "P99",
                "column": "duration_ms",
                "order": "descending",
            }])
        );
    }

    #[test]
    fn test_body_omits_empty_sections() {
        let body = query_body(&QuerySpecification::count(TimeRange::Relative {
            seconds: 60,
        }));
        assert!(body.get("filters").is_none());
        assert!(body.get("breakdowns").is_none());
        assert!(body.get("havings").is_none());
        assert!(body.get("orders").is_none());
        assert!(body.get("limit").is_none());
    }

    #[test]
    fn test_spec_rejections_map_to_validation() {
        assert!(matches!(
            creation_error(422, "AVG requires a column".to_string()),
            Error::QueryValidation(_)
        ));
        assert!(matches!(
            creation_error(400, "unknown filter op".to_string()),
            Error::QueryValidation(_)
        ));
    }

    #[test]
    fn test_rate_limit_is_not_a_validation_error() {
        // A 429 that outlives the retry loop means the caller was throttled,
        // not that the spec is wrong.
        assert!(matches!(
            creation_error(429, "rate limited".to_string()),
            Error::Api { status: 429, .. }
        ));
    }

    #[test]
    fn test_missing_dataset_and_server_errors_stay_api_errors() {
        assert!(matches!(
            creation_error(404, "dataset not found".to_string()),
            Error::Api { status: 404, .. }
        ));
        assert!(matches!(
            creation_error(500, "internal error".to_string()),
            Error::Api { status: 500, .. }
        ));
    }

    #[test]
    fn test_body_filters_serialize_with_wire_ops() {
        let mut spec = spec();
        spec.filters = vec![parse_filter("duration_ms:>=:250").unwrap()];
        let body = query_body(&spec);
        assert_eq!(
            body["filters"],
            serde_json::json!([{"column": "duration_ms", "op": ">=", "value": 250}])
        );
    }
}
