//! Human-readable progress lines.
//!
//! The engine reports milestones and status updates through a sink instead
//! of printing directly; the CLI prints, tests collect. Progress lines are
//! informational only and never replace a typed error.

/// Receiver for one-line progress messages.
pub trait ProgressSink {
    fn line(&mut self, msg: &str);
}

/// Collects lines in memory. Used by tests to assert on emitted output.
impl ProgressSink for Vec<String> {
    fn line(&mut self, msg: &str) {
        self.push(msg.to_string());
    }
}

/// Drops all lines. Useful when a caller wants a quiet run.
pub struct DiscardSink;

impl ProgressSink for DiscardSink {
    fn line(&mut self, _msg: &str) {}
}
