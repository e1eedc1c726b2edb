//! The two backup targets and everything vendor-shaped about them.

use super::ProgressSnapshot;

/// A backup target on the cloud host. Confluence and Jira expose the same
/// start/progress endpoint pair with different paths, payload quirks and
/// completion signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Confluence,
    Jira,
}

impl Target {
    /// Lowercase name used in artifact file names.
    pub fn name(self) -> &'static str {
        match self {
            Target::Confluence => "confluence",
            Target::Jira => "jira",
        }
    }

    /// Human-facing name for progress lines.
    pub fn display(self) -> &'static str {
        match self {
            Target::Confluence => "Confluence",
            Target::Jira => "Jira",
        }
    }

    pub fn start_url(self, base: &str) -> String {
        match self {
            Target::Confluence => format!("{base}/wiki/rest/obm/1.0/runbackup"),
            Target::Jira => format!("{base}/rest/backup/1/export/runbackup"),
        }
    }

    pub fn progress_url(self, base: &str, task_id: Option<&str>) -> String {
        match (self, task_id) {
            (Target::Confluence, _) => format!("{base}/wiki/rest/obm/1.0/getprogress"),
            (Target::Jira, Some(id)) => {
                format!("{base}/rest/backup/1/export/getProgress?taskId={id}")
            }
            (Target::Jira, None) => format!("{base}/rest/backup/1/export/getProgress"),
        }
    }

    /// Whether the start response must carry a task identifier.
    pub fn requires_task_id(self) -> bool {
        matches!(self, Target::Jira)
    }

    /// Progress field whose presence means the export is finished.
    pub fn completion_key(self) -> &'static str {
        match self {
            Target::Confluence => "fileName",
            Target::Jira => "result",
        }
    }

    /// Artifact URL derived from the completion field's value.
    pub fn locator_url(self, base: &str, value: &str) -> String {
        match self {
            Target::Confluence => format!("{base}/wiki/download/{value}"),
            Target::Jira => format!("{base}/plugins/servlet/{value}"),
        }
    }

    /// One status line per successful poll, from the target's own fields.
    pub fn status_line(self, snapshot: &ProgressSnapshot) -> String {
        let f = |key: &str| snapshot.field(key).unwrap_or_else(|| "?".to_string());
        match self {
            Target::Confluence => format!(
                "Current status: {}; {}",
                f("alternativePercentage"),
                f("currentStatus")
            ),
            Target::Jira => format!(
                "Current status: {} {}; {}",
                f("status"),
                f("progress"),
                f("description")
            ),
        }
    }
}
