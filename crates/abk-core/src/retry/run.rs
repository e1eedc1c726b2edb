//! Retry loop: run a closure until success or the policy says stop.

use super::classify::classify;
use super::error::TransferError;
use super::policy::{RetryDecision, RetryPolicy};

/// Runs a closure until it succeeds or the retry policy says to stop.
/// On a retryable failure, sleeps the fixed delay then tries again. The
/// returned error is always the last one observed.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, mut f: F) -> Result<T, TransferError>
where
    F: FnMut() -> Result<T, TransferError>,
{
    let mut attempt = 1u32;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(d) => {
                        tracing::debug!(attempt, "transient failure, retrying: {}", e);
                        std::thread::sleep(d);
                        attempt += 1;
                    }
                }
            }
        }
    }
}
