//! Bounded query executor
//!
//! Issues exactly one query for a given cursor position and row limit, polls
//! the backend until it reports completion or the per-page timeout elapses,
//! and returns the page. Transport-level retry happens beneath this layer;
//! query timeouts and validation rejections are surfaced, never retried here.

use std::time::Duration;

use tokio::time::Instant;

use hnytools_core::cursor::{page_query, Cursor};
use hnytools_core::page::{PageResult, MAX_ROWS_PER_QUERY};
use hnytools_core::query::QuerySpecification;

use crate::api::HoneycombConfig;
use crate::error::Error;
use crate::query::client;

/// One bounded page fetch. Implemented over HTTP in production and by
/// scripted fixtures in tests.
pub trait QueryExecutor {
    async fn execute(
        &self,
        spec: &QuerySpecification,
        cursor: &Cursor,
        row_limit: usize,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<PageResult, Error>;
}

/// Executor backed by the Honeycomb query-data endpoints
pub struct HoneycombExecutor {
    client: reqwest::Client,
    config: HoneycombConfig,
    dataset: String,
}

impl HoneycombExecutor {
    pub fn new(config: HoneycombConfig, dataset: String) -> Result<Self, Error> {
        let client = crate::api::create_authenticated_client(&config)?;
        Ok(Self {
            client,
            config,
            dataset,
        })
    }
}

impl QueryExecutor for HoneycombExecutor {
    async fn execute(
        &self,
        spec: &QuerySpecification,
        cursor: &Cursor,
        row_limit: usize,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<PageResult, Error> {
        // Requests beyond the backend cap are clamped, not rejected.
        let row_limit = row_limit.min(MAX_ROWS_PER_QUERY).max(1);

        let page_spec =
            page_query(spec, cursor, row_limit).map_err(|e| Error::QueryValidation(e.to_string()))?;

        let query_id =
            client::create_query(&self.client, &self.config, &self.dataset, &page_spec).await?;
        let result_id =
            client::create_query_result(&self.client, &self.config, &self.dataset, &query_id)
                .await?;

        let deadline = Instant::now() + timeout;

        loop {
            let result =
                client::get_query_result(&self.client, &self.config, &self.dataset, &result_id)
                    .await?;

            if result.complete {
                let rows: Vec<_> = result.data.results.into_iter().map(|r| r.data).collect();
                let row_count = rows.len();
                return Ok(PageResult {
                    rows,
                    row_count,
                    truncated: row_count >= row_limit,
                });
            }

            if Instant::now() >= deadline {
                return Err(Error::QueryTimeout(timeout.as_secs_f64()));
            }

            tokio::time::sleep(poll_interval).await;
        }
    }
}
