//! Low-level transfer error used for retry classification.

/// Error raised by one network call (API request, download attempt, part
/// upload). Classified before being converted into a pipeline error, so the
/// retry layer can decide transient vs terminal.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// libcurl reported an error (timeout, reset, truncation, ...).
    #[error("{0}")]
    Curl(#[from] curl::Error),

    /// The response carried an unexpected HTTP status.
    #[error("HTTP {code}: {body}")]
    Http { code: u32, body: String },

    /// The stream ended short of the announced length without a curl error.
    #[error("truncated body: expected {expected} bytes, received {received}")]
    Truncated { expected: u64, received: u64 },

    /// The response could not be interpreted (bad JSON, missing field).
    #[error("malformed response: {0}")]
    Malformed(String),
}
