//! Per-target backup pipeline: start + poll, download, upload, cleanup.
//!
//! Targets run strictly one after another. Triggering an export has side
//! effects on the remote service, so nothing here is concurrent, and any
//! error aborts the remaining steps.

use std::path::Path;

use chrono::Local;

use crate::client::ApiClient;
use crate::config::AbkConfig;
use crate::download;
use crate::error::Result;
use crate::export::{self, PollSettings, Target};
use crate::progress::ProgressSink;
use crate::retry::RetryPolicy;
use crate::upload::{self, StoreClient};

/// Which targets this run covers. Neither flag set means both, in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetSelection {
    pub confluence: bool,
    pub jira: bool,
}

impl TargetSelection {
    pub fn targets(&self) -> Vec<Target> {
        if !self.confluence && !self.jira {
            return vec![Target::Confluence, Target::Jira];
        }
        let mut targets = Vec::new();
        if self.confluence {
            targets.push(Target::Confluence);
        }
        if self.jira {
            targets.push(Target::Jira);
        }
        targets
    }
}

/// Run the full pipeline for every selected target. Artifacts land in
/// `download_dir` as `{target}_export_{ddmmyyyy}.zip`.
pub fn run_backup(
    cfg: &AbkConfig,
    selection: &TargetSelection,
    download_dir: &Path,
    sink: &mut dyn ProgressSink,
) -> Result<()> {
    cfg.validate()?;
    let client = ApiClient::new(&cfg.base_url(), &cfg.user_email, &cfg.api_token);
    let policy = cfg.retry_policy();
    let settings = PollSettings::from_config(cfg);
    let stamp = Local::now().format("%d%m%Y").to_string();

    sink.line(&format!(
        "Starting backup; include attachments: {}",
        cfg.include_attachments
    ));
    for target in selection.targets() {
        run_target(cfg, &client, target, &policy, &settings, &stamp, download_dir, sink)?;
    }
    Ok(())
}

fn run_target(
    cfg: &AbkConfig,
    client: &ApiClient,
    target: Target,
    policy: &RetryPolicy,
    settings: &PollSettings,
    stamp: &str,
    download_dir: &Path,
    sink: &mut dyn ProgressSink,
) -> Result<()> {
    let payload = export::start_payload(cfg.include_attachments, &cfg.export_to_cloud);
    let handle = export::start(client, target, &payload)?;
    match handle.task_id.as_deref() {
        Some(id) => sink.line(&format!(
            "{} backup process successfully started: taskId={id}",
            target.display()
        )),
        None => sink.line(&format!(
            "{} backup process successfully started",
            target.display()
        )),
    }

    let locator = export::await_completion(client, &handle, settings, sink)?;
    sink.line(&format!("{} backup URL: {}", target.display(), locator.url));

    let file_name = format!("{}_export_{}.zip", target.name(), stamp);
    if !cfg.download_locally {
        sink.line(&format!("Skipping local download for {} backup.", target.name()));
        return Ok(());
    }

    let dest = download_dir.join(&file_name);
    download::download(&locator, &dest, policy, sink)?;

    match cfg.upload.as_ref() {
        Some(u) if !u.bucket.is_empty() => {
            let store = StoreClient::from_config(u);
            upload::upload_file(&store, &dest, &file_name, upload::PART_SIZE, policy, sink)?;
        }
        _ => {}
    }
    Ok(())
}
