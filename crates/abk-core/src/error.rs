//! Error taxonomy for the backup pipeline.
//!
//! Every fatal condition surfaces as a distinct variant so callers can tell
//! a rejected start apart from an exhausted retry budget or a failed
//! finalize. Low-level network faults live in [`retry::TransferError`] and
//! are wrapped here once retry decisions are settled.

use crate::retry::TransferError;

/// Fatal errors raised by the backup pipeline. Any of these aborts the
/// remaining steps for the current target.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// Configuration is unusable (placeholder host, unparseable host URL).
    /// Raised before any network call.
    #[error("configuration: {0}")]
    Config(String),

    /// The start endpoint answered with a non-200 status. Carries the raw
    /// status and body for diagnostics.
    #[error("backup start rejected: HTTP {status}: {body}")]
    JobStart { status: u32, body: String },

    /// A transient fault persisted past the retry budget. Carries the last
    /// underlying error, not a generic message.
    #[error("giving up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: TransferError,
    },

    /// Non-transient request failure (unexpected status, malformed body,
    /// write fault). Never retried.
    #[error("protocol error: {0}")]
    Protocol(#[from] TransferError),

    /// The optional poll wall-clock cap was exceeded before the remote job
    /// reported completion.
    #[error("export did not complete within {elapsed_secs}s")]
    PollTimeout { elapsed_secs: u64 },

    /// Multipart finalize returned a non-success status. The local file is
    /// kept so the upload can be re-attempted by hand.
    #[error("multipart finalize for {key} returned HTTP {status}; local file kept")]
    Upload { status: u32, key: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BackupError>;
