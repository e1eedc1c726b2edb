use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::BackupError;
use crate::retry::RetryPolicy;

/// Host value shipped in the default config. Running against it means the
/// file was never edited.
pub const PLACEHOLDER_HOST: &str = "something.atlassian.net";

/// Retry parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per network call (including the first).
    pub max_attempts: u32,
    /// Fixed delay in seconds between attempts.
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_secs: 10,
        }
    }
}

/// Object-store destination for finished artifacts (optional section).
/// An empty `bucket` disables the upload step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Store endpoint, e.g. "https://oss-eu-central-1.example.com".
    pub endpoint: String,
    pub access_key_id: String,
    pub access_key_secret: String,
    pub bucket: String,
    /// Remote directory prefix inside the bucket. May be empty.
    #[serde(default)]
    pub dir: String,
}

/// Global configuration loaded from `~/.config/abk/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbkConfig {
    /// Cloud host, e.g. "mycompany.atlassian.net". A scheme may be given
    /// explicitly; https is assumed otherwise.
    pub host_url: String,
    /// Account email for basic auth.
    pub user_email: String,
    /// API token paired with the email.
    pub api_token: String,
    /// Ask the export to include attachments.
    pub include_attachments: bool,
    /// Value sent as `exportToCloud` in the start payload. The deployed
    /// service accepts the historical literal "frue"; kept configurable
    /// rather than hard-coded.
    #[serde(default = "default_export_to_cloud")]
    pub export_to_cloud: String,
    /// Download the finished artifact to the working directory.
    pub download_locally: bool,
    /// Poll interval in seconds (also the default retry delay).
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,
    /// Optional wall-clock cap on polling, in seconds. Absent = poll until
    /// the remote job finishes, however long that takes.
    #[serde(default)]
    pub max_poll_secs: Option<u64>,
    /// Optional retry parameters; built-in defaults otherwise.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional object-store upload destination.
    #[serde(default)]
    pub upload: Option<UploadConfig>,
}

fn default_export_to_cloud() -> String {
    "frue".to_string()
}

fn default_wait_secs() -> u64 {
    10
}

impl Default for AbkConfig {
    fn default() -> Self {
        Self {
            host_url: PLACEHOLDER_HOST.to_string(),
            user_email: String::new(),
            api_token: String::new(),
            include_attachments: true,
            export_to_cloud: default_export_to_cloud(),
            download_locally: true,
            wait_secs: default_wait_secs(),
            max_poll_secs: None,
            retry: None,
            upload: None,
        }
    }
}

impl AbkConfig {
    /// Rejects configs that cannot work: the unedited placeholder host or a
    /// host that does not parse as a URL. Called before any network call.
    pub fn validate(&self) -> Result<(), BackupError> {
        if self.host_url == PLACEHOLDER_HOST {
            return Err(BackupError::Config(
                "host_url still has the placeholder value; edit the config file or run `abk init`"
                    .to_string(),
            ));
        }
        let base = self.base_url();
        url::Url::parse(&base)
            .map_err(|e| BackupError::Config(format!("invalid host_url {:?}: {}", self.host_url, e)))?;
        Ok(())
    }

    /// Base URL for the cloud host. `host_url` may carry an explicit scheme
    /// (useful against local test servers); https is assumed otherwise.
    pub fn base_url(&self) -> String {
        if self.host_url.contains("://") {
            self.host_url.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", self.host_url)
        }
    }

    /// Retry policy for every network call site. The delay defaults to the
    /// poll interval when no `[retry]` section is given.
    pub fn retry_policy(&self) -> RetryPolicy {
        match &self.retry {
            Some(r) => RetryPolicy {
                max_attempts: r.max_attempts,
                delay: Duration::from_secs(r.delay_secs),
            },
            None => RetryPolicy {
                max_attempts: 5,
                delay: Duration::from_secs(self.wait_secs),
            },
        }
    }

    /// True when an upload destination is configured (non-empty bucket).
    pub fn upload_enabled(&self) -> bool {
        matches!(&self.upload, Some(u) if !u.bucket.is_empty())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("abk")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Write the default config to `path`, creating parent directories.
pub fn write_default(path: &Path) -> Result<()> {
    let toml = toml::to_string_pretty(&AbkConfig::default())?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, toml)?;
    Ok(())
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<AbkConfig> {
    let path = config_path()?;
    if !path.exists() {
        write_default(&path)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(AbkConfig::default());
    }

    let data = fs::read_to_string(&path)?;
    let cfg: AbkConfig = toml::from_str(&data)?;
    Ok(cfg)
}
