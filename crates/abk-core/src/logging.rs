//! Logging init: file under the XDG state dir.

use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Initialize structured logging to `~/.local/state/abk/abk.log`.
/// On failure (e.g. log dir unwritable), returns Err so the caller can
/// decide whether to continue without a log file.
pub fn init_logging() -> Result<()> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("abk")?;
    let log_dir = xdg_dirs.get_state_home();
    fs::create_dir_all(&log_dir)?;
    let log_file_path: PathBuf = log_dir.join("abk.log");

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,abk_core=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();

    tracing::info!("abk logging initialized at {}", log_file_path.display());

    Ok(())
}
