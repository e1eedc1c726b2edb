//! Chunked multipart upload with guarded local cleanup.
//!
//! The source file is read sequentially in fixed-size parts; each part is
//! retried individually under the bounded policy. Deleting the local file
//! is the one destructive side effect in the pipeline, so it fires only
//! after the finalize call confirms success.

mod session;
mod store;

pub use session::{PartTag, UploadSession};
pub use store::StoreClient;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{BackupError, Result};
use crate::progress::ProgressSink;
use crate::retry::{self, run_with_retry, RetryPolicy};

/// Default part size: 50 MiB.
pub const PART_SIZE: u64 = 50 * 1024 * 1024;

/// Upload `local` to the store under `remote_name`, then delete it.
///
/// Deletion happens if and only if the finalize status confirms success;
/// a failed or ambiguous finalize keeps the file and raises
/// [`BackupError::Upload`] so the operator can re-attempt by hand.
pub fn upload_file(
    store: &StoreClient,
    local: &Path,
    remote_name: &str,
    part_size: u64,
    policy: &RetryPolicy,
    sink: &mut dyn ProgressSink,
) -> Result<()> {
    let key = store.remote_key(remote_name);
    let mut session = store.initiate(&key).map_err(BackupError::Protocol)?;
    tracing::debug!(%key, upload_id = session.upload_id(), "multipart session opened");

    let mut file = File::open(local)?;
    let mut buf = vec![0u8; part_size as usize];
    loop {
        let n = read_part(&mut file, &mut buf)?;
        if n == 0 {
            break;
        }
        let number = session.next_part_number();
        let chunk = &buf[..n];
        let etag = run_with_retry(policy, || store.upload_part(&session, number, chunk))
            .map_err(|e| retry::surface(policy, e))?;
        session.record(etag);
        sink.line(&format!("Uploaded part {number} of {remote_name}"));
    }

    let status = store.complete(session).map_err(BackupError::Protocol)?;
    if !(200..300).contains(&status) {
        return Err(BackupError::Upload { status, key });
    }
    sink.line(&format!("File {remote_name} successfully uploaded to {key}."));

    std::fs::remove_file(local)?;
    sink.line(&format!("Local file {} deleted.", local.display()));
    Ok(())
}

/// Fill `buf` from `file`, stopping only at EOF or a full buffer. Returns
/// the number of bytes read (0 at EOF).
fn read_part(file: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
