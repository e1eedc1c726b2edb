//! `abk run` – trigger, await, download and archive the selected exports.

use anyhow::Result;
use abk_core::config;
use abk_core::pipeline::{self, TargetSelection};
use abk_core::progress::ProgressSink;

/// Prints each progress line as it arrives.
struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn line(&mut self, msg: &str) {
        println!("{msg}");
    }
}

pub fn run_backup(confluence: bool, jira: bool) -> Result<()> {
    let cfg = config::load_or_init()?;
    tracing::debug!("loaded config for host {}", cfg.host_url);

    if !confluence && !jira {
        println!("Running both Confluence and Jira backups as no specific option is provided.");
    }
    let selection = TargetSelection { confluence, jira };
    let download_dir = std::env::current_dir()?;

    let mut sink = ConsoleSink;
    pipeline::run_backup(&cfg, &selection, &download_dir, &mut sink)?;
    Ok(())
}
