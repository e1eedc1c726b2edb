//! Poll-until-completion state machine.
//!
//! One request starts the job; after that the loop has exactly three exits:
//! the completion key appears (done), a non-transient failure occurs, or
//! transient failures exhaust the retry budget. "Still running" and
//! "transient error within budget" both stay in the loop.

use std::time::{Duration, Instant};

use crate::client::ApiClient;
use crate::config::AbkConfig;
use crate::error::{BackupError, Result};
use crate::progress::ProgressSink;
use crate::retry::{self, classify, RetryDecision, RetryPolicy, TransferError};

use super::{DownloadLocator, JobHandle, ProgressSnapshot, Target};

/// Poll cadence and limits, usually derived from the config file.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    /// Interval slept before the first poll and between polls.
    pub wait: Duration,
    /// Optional wall-clock cap on the whole poll. None = wait for the
    /// remote job however long it takes.
    pub max_poll: Option<Duration>,
    pub policy: RetryPolicy,
}

impl PollSettings {
    pub fn from_config(cfg: &AbkConfig) -> Self {
        Self {
            wait: Duration::from_secs(cfg.wait_secs),
            max_poll: cfg.max_poll_secs.map(Duration::from_secs),
            policy: cfg.retry_policy(),
        }
    }
}

/// Issue the one start request for `target`.
///
/// A non-200 answer fails with the raw status and body; no progress request
/// is ever issued for a job that did not start. Jira's 200 body must carry
/// the task identifier used by its progress endpoint.
pub fn start(client: &ApiClient, target: Target, payload: &serde_json::Value) -> Result<JobHandle> {
    let url = target.start_url(client.base_url());
    let resp = client.post_json(&url, payload).map_err(BackupError::Protocol)?;
    if resp.status != 200 {
        return Err(BackupError::JobStart {
            status: resp.status,
            body: resp.body,
        });
    }

    let task_id = if target.requires_task_id() {
        let body = ProgressSnapshot::parse(&resp.body)?;
        Some(body.field("taskId").ok_or_else(|| {
            TransferError::Malformed("start response carries no taskId".to_string())
        })?)
    } else {
        None
    };

    tracing::info!(job = target.name(), task_id = task_id.as_deref(), "export job started");
    Ok(JobHandle { target, task_id })
}

/// Block until the job behind `handle` reports a finished artifact, then
/// derive its download locator.
///
/// Sleeps one wait interval up front: a job that was just accepted has no
/// progress to report yet. Transient poll failures share one cumulative
/// retry budget; the remote job finishing is otherwise the only way out
/// unless `max_poll` is set.
pub fn await_completion(
    client: &ApiClient,
    handle: &JobHandle,
    settings: &PollSettings,
    sink: &mut dyn ProgressSink,
) -> Result<DownloadLocator> {
    let url = handle
        .target
        .progress_url(client.base_url(), handle.task_id.as_deref());
    let key = handle.target.completion_key();
    let started = Instant::now();
    let mut failures = 0u32;

    std::thread::sleep(settings.wait);
    loop {
        if let Some(cap) = settings.max_poll {
            if started.elapsed() >= cap {
                return Err(BackupError::PollTimeout {
                    elapsed_secs: started.elapsed().as_secs(),
                });
            }
        }

        let resp = match client.get(&url) {
            Ok(resp) => resp,
            Err(e) => {
                failures += 1;
                match settings.policy.decide(failures, classify(&e)) {
                    RetryDecision::NoRetry => return Err(retry::surface(&settings.policy, e)),
                    RetryDecision::RetryAfter(delay) => {
                        sink.line(&format!(
                            "Transient error while polling: {e}. Retrying {failures}/{}...",
                            settings.policy.max_attempts
                        ));
                        std::thread::sleep(delay);
                        continue;
                    }
                }
            }
        };
        if resp.status != 200 {
            return Err(BackupError::Protocol(TransferError::Http {
                code: resp.status,
                body: resp.body,
            }));
        }

        let snapshot = ProgressSnapshot::parse(&resp.body)?;
        sink.line(&handle.target.status_line(&snapshot));

        if let Some(value) = snapshot.field(key) {
            let url = handle.target.locator_url(client.base_url(), &value);
            tracing::info!(job = handle.target.name(), %url, "export finished");
            return Ok(DownloadLocator {
                url,
                auth: client.credentials().clone(),
            });
        }
        std::thread::sleep(settings.wait);
    }
}
