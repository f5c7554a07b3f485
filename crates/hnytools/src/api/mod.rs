//! HTTP transport shared by every Honeycomb endpoint
//!
//! Owns authentication headers and the retry/backoff policy for transient
//! HTTP failures. Layers above this one never retry: a request that comes
//! back from here has already been through the backoff loop.

use std::time::Duration;

use rand::Rng;

use crate::error::Error;

/// Transient failures get this many attempts total before surfacing
const MAX_ATTEMPTS: u32 = 4;
const BACKOFF_BASE_MS: u64 = 250;

/// Honeycomb connection settings, resolved from the global CLI flags and
/// their environment bindings
#[derive(Debug, Clone)]
pub struct HoneycombConfig {
    pub base_url: String,
    pub api_key: String,
}

impl HoneycombConfig {
    /// Build the config from the parsed global flags. The API key has no
    /// default; a missing key is a hard error before any request is made.
    pub fn from_global(global: &crate::Global) -> Result<Self, Error> {
        let api_key = global.api_key.clone().ok_or_else(|| {
            Error::InvalidArgument(
                "Honeycomb API key not set (use --api-key or HONEYCOMB_API_KEY)".to_string(),
            )
        })?;

        Ok(Self {
            base_url: global.api_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

/// Create an HTTP client with the Honeycomb team key and JSON headers applied
/// to every request
pub fn create_authenticated_client(config: &HoneycombConfig) -> Result<reqwest::Client, Error> {
    use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

    let mut headers = HeaderMap::new();
    let mut key_value = HeaderValue::from_str(&config.api_key)
        .map_err(|e| Error::InvalidArgument(format!("Invalid API key: {}", e)))?;
    key_value.set_sensitive(true);
    headers.insert("X-Honeycomb-Team", key_value);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .map_err(|e| Error::Generic(format!("Failed to build HTTP client: {}", e)))
}

/// Send a request, retrying 429 and 5xx responses (and connection errors)
/// with exponential backoff plus jitter. Anything else is returned as-is for
/// the caller to interpret.
pub async fn send_with_retry(request: reqwest::RequestBuilder) -> Result<reqwest::Response, Error> {
    let mut attempt = 0;

    loop {
        attempt += 1;
        let req = request.try_clone().ok_or_else(|| {
            Error::Generic("Request body cannot be cloned for retry".to_string())
        })?;

        match req.send().await {
            Ok(response) => {
                let status = response.status();
                let transient = status.as_u16() == 429 || status.is_server_error();
                if transient && attempt < MAX_ATTEMPTS {
                    backoff(attempt).await;
                    continue;
                }
                return Ok(response);
            }
            Err(_) if attempt < MAX_ATTEMPTS => {
                backoff(attempt).await;
            }
            Err(e) => return Err(Error::Network(e.to_string())),
        }
    }
}

async fn backoff(attempt: u32) {
    let base = BACKOFF_BASE_MS * 2u64.pow(attempt - 1);
    let jitter = rand::thread_rng().gen_range(0..=base / 2);
    tokio::time::sleep(Duration::from_millis(base + jitter)).await;
}

/// Read an error response body into our API error variant
pub async fn api_error(response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    Error::Api { status, message }
}
