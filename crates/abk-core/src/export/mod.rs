//! Export job lifecycle: start a remote export, poll until it reports a
//! finished artifact, hand back a download locator.
//!
//! Both backup targets share one poll loop; everything vendor-shaped
//! (endpoints, payload keys, completion key, locator format) lives in
//! [`Target`].

mod poller;
mod target;

pub use poller::{await_completion, start, PollSettings};
pub use target::Target;

use crate::client::Credentials;
use crate::retry::TransferError;

/// Immutable record of a successfully started export job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub target: Target,
    /// Task identifier from the start response, when the target issues one.
    /// Threaded into the progress URL.
    pub task_id: Option<String>,
}

/// URL of the finished artifact plus the auth context needed to fetch it.
#[derive(Debug, Clone)]
pub struct DownloadLocator {
    pub url: String,
    pub auth: Credentials,
}

/// One poll response, replaced wholesale on every successful poll. Keys are
/// vendor-specific; completion is detected by key presence.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot(serde_json::Map<String, serde_json::Value>);

impl ProgressSnapshot {
    /// Parse a response body into a snapshot. Anything but a JSON object is
    /// a malformed response.
    pub fn parse(body: &str) -> Result<Self, TransferError> {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| TransferError::Malformed(format!("body is not JSON: {e}")))?;
        match value {
            serde_json::Value::Object(map) => Ok(Self(map)),
            other => Err(TransferError::Malformed(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    /// Field rendered for display or URL building. Strings come back as-is;
    /// numbers and booleans are rendered; null and missing are `None`.
    pub fn field(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// JSON body for the start-job request. The second value rides along
/// verbatim from configuration (see `AbkConfig::export_to_cloud`).
pub fn start_payload(include_attachments: bool, export_to_cloud: &str) -> serde_json::Value {
    serde_json::json!({
        "cbAttachments": include_attachments.to_string(),
        "exportToCloud": export_to_cloud,
    })
}
