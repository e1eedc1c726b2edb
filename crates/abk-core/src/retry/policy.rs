use std::time::Duration;

/// High-level classification of a network fault for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connect or read timed out.
    Timeout,
    /// Network-level failure (connection refused/reset, DNS, empty reply).
    Connection,
    /// The body ended short of the announced length (truncated stream).
    Truncated,
    /// Any other error. Never retried.
    Other,
}

impl ErrorKind {
    /// True for kinds the policy is willing to retry.
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorKind::Other)
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Bounded retry with a fixed delay between attempts.
///
/// The delay is a constant interval, not exponential backoff; callers that
/// want backoff must not get it silently from here.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay before each retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after a failed attempt.
    ///
    /// `attempt` is 1-based (1 = first attempt). Returns `NoRetry` once the
    /// budget is spent or the kind is not transient.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        if kind.is_transient() {
            RetryDecision::RetryAfter(self.delay)
        } else {
            RetryDecision::NoRetry
        }
    }
}
