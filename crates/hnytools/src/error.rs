#[derive(thiserror::Error, Debug, serde::Deserialize, serde::Serialize)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    #[error("Generic {0}")]
    Generic(String),

    /// Caller misuse, rejected before the first page fetch
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend rejected the query specification. Fatal, never retried.
    #[error("Query validation failed: {0}")]
    QueryValidation(String),

    /// A single page did not complete within its timeout. Fatal to the run;
    /// the caller may retry the whole run from scratch.
    #[error("Query did not complete within {0:.0} seconds")]
    QueryTimeout(f64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error [{status}]: {message}")]
    Api { status: u16, message: String },
}
