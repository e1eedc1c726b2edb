//! Resumable streamed download.
//!
//! The on-disk file is the resume state: every attempt starts a ranged GET
//! at the file's current size and appends. A crash or dropped connection
//! leaves a valid prefix; nothing is ever re-requested or rewritten.

use std::cell::Cell;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::export::DownloadLocator;
use crate::progress::ProgressSink;
use crate::retry::{self, classify, RetryDecision, RetryPolicy, TransferError};

/// A progress line is emitted once per this many received bytes.
pub const PROGRESS_CHUNK: u64 = 50 * 1024 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
/// Overall cap on one streaming attempt; exports can run to many GiB.
const STREAM_TIMEOUT: Duration = Duration::from_secs(3600);

/// Stream the artifact behind `locator` into `dest`, resuming from whatever
/// prefix is already on disk.
///
/// Transient mid-stream faults re-enter the loop with a fresh offset read
/// from the file. An HTTP failure status (bad range, auth) is terminal on
/// the first occurrence; `fail_on_error` keeps its body out of the file.
pub fn download(
    locator: &DownloadLocator,
    dest: &Path,
    policy: &RetryPolicy,
    sink: &mut dyn ProgressSink,
) -> Result<()> {
    let mut attempt = 0u32;
    loop {
        let start_offset = std::fs::metadata(dest).map(|m| m.len()).unwrap_or(0);
        let file = OpenOptions::new().create(true).append(true).open(dest)?;
        match fetch_range(locator, file, start_offset, sink) {
            Ok(total) => {
                sink.line(&format!("File {} downloaded successfully.", dest.display()));
                tracing::info!(dest = %dest.display(), total, "download complete");
                return Ok(());
            }
            Err(e) => {
                attempt += 1;
                match policy.decide(attempt, classify(&e)) {
                    RetryDecision::NoRetry => return Err(retry::surface(policy, e)),
                    RetryDecision::RetryAfter(delay) => {
                        sink.line(&format!(
                            "Error downloading file: {e}. Retrying {attempt}/{}...",
                            policy.max_attempts
                        ));
                        std::thread::sleep(delay);
                    }
                }
            }
        }
    }
}

/// One ranged GET appended to `file`. Returns the total bytes on disk after
/// a clean end of stream.
fn fetch_range(
    locator: &DownloadLocator,
    mut file: File,
    start_offset: u64,
    sink: &mut dyn ProgressSink,
) -> std::result::Result<u64, TransferError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(&locator.url)?;
    easy.username(&locator.auth.username)?;
    easy.password(&locator.auth.secret)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    // Error statuses abort before the body callback runs, so a 403 page
    // never lands in the artifact file.
    easy.fail_on_error(true)?;
    easy.connect_timeout(CONNECT_TIMEOUT)?;
    easy.timeout(STREAM_TIMEOUT)?;
    easy.range(&format!("{start_offset}-"))?;

    sink.line(&format!("Resuming download from byte {start_offset}"));

    let written = Cell::new(start_offset);
    let since_report = Cell::new(0u64);
    let total = Cell::new(None::<u64>);
    let perform_result = {
        let mut transfer = easy.transfer();
        transfer.header_function(|line| {
            if let Some(remaining) = parse_content_length(line) {
                total.set(Some(start_offset + remaining));
            }
            true
        })?;
        transfer.write_function(|data| {
            if let Err(e) = file.write_all(data) {
                tracing::warn!("download write failed: {}", e);
                return Ok(0); // abort transfer
            }
            written.set(written.get() + data.len() as u64);
            let since = since_report.get() + data.len() as u64;
            if since >= PROGRESS_CHUNK {
                sink.line(&progress_line(written.get(), total.get()));
                since_report.set(0);
            } else {
                since_report.set(since);
            }
            Ok(data.len())
        })?;
        transfer.perform()
    };

    if let Err(e) = perform_result {
        if e.is_http_returned_error() {
            let code = easy.response_code().unwrap_or(0);
            return Err(TransferError::Http {
                code,
                body: String::new(),
            });
        }
        return Err(TransferError::Curl(e));
    }

    if let Some(expected) = total.get() {
        if written.get() < expected {
            return Err(TransferError::Truncated {
                expected,
                received: written.get(),
            });
        }
    }
    sink.line(&progress_line(written.get(), total.get()));
    Ok(written.get())
}

fn progress_line(written: u64, total: Option<u64>) -> String {
    match total {
        Some(t) => format!("Downloaded {written} of {t} bytes"),
        None => format!("Downloaded {written} bytes"),
    }
}

fn parse_content_length(line: &[u8]) -> Option<u64> {
    let line = std::str::from_utf8(line).ok()?;
    let (name, value) = line.split_once(':')?;
    if name.trim().eq_ignore_ascii_case("content-length") {
        value.trim().parse().ok()
    } else {
        None
    }
}
