//! S3-compatible multipart store calls: initiate, upload part, complete.

use std::time::Duration;

use crate::client::{perform_collecting, Credentials};
use crate::config::UploadConfig;
use crate::retry::TransferError;

use super::session::UploadSession;

/// Client for one bucket on an S3-compatible endpoint. Authenticates with
/// the configured opaque key pair.
pub struct StoreClient {
    endpoint: String,
    bucket: String,
    dir: String,
    credentials: Credentials,
}

impl StoreClient {
    pub fn from_config(cfg: &UploadConfig) -> Self {
        Self {
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            bucket: cfg.bucket.clone(),
            dir: cfg.dir.clone(),
            credentials: Credentials {
                username: cfg.access_key_id.clone(),
                secret: cfg.access_key_secret.clone(),
            },
        }
    }

    /// Object key for an artifact: the configured directory joined with the
    /// remote name.
    pub fn remote_key(&self, name: &str) -> String {
        let dir = self.dir.trim_matches('/');
        if dir.is_empty() {
            name.to_string()
        } else {
            format!("{dir}/{name}")
        }
    }

    /// Open a multipart session for `key`.
    pub fn initiate(&self, key: &str) -> Result<UploadSession, TransferError> {
        let url = format!("{}?uploads", self.object_url(key));
        let mut easy = self.handle(&url)?;
        easy.post(true)?;
        easy.post_fields_copy(b"")?;
        let resp = perform_collecting(easy)?;
        if !resp.is_success() {
            return Err(TransferError::Http {
                code: resp.status,
                body: resp.body,
            });
        }
        let upload_id = extract_tag(&resp.body, "UploadId").ok_or_else(|| {
            TransferError::Malformed("initiate response carries no UploadId".to_string())
        })?;
        Ok(UploadSession::new(key, upload_id))
    }

    /// PUT one part; returns the store's integrity tag for it.
    pub fn upload_part(
        &self,
        session: &UploadSession,
        number: u32,
        data: &[u8],
    ) -> Result<String, TransferError> {
        let url = format!(
            "{}?partNumber={}&uploadId={}",
            self.object_url(session.key()),
            number,
            session.upload_id()
        );
        let mut easy = self.handle(&url)?;
        easy.upload(true)?;
        easy.in_filesize(data.len() as u64)?;

        let mut headers: Vec<String> = Vec::new();
        let mut body: Vec<u8> = Vec::new();
        let mut cursor = 0usize;
        {
            let mut transfer = easy.transfer();
            transfer.read_function(|buf| {
                let n = buf.len().min(data.len() - cursor);
                buf[..n].copy_from_slice(&data[cursor..cursor + n]);
                cursor += n;
                Ok(n)
            })?;
            transfer.header_function(|line| {
                if let Ok(s) = std::str::from_utf8(line) {
                    headers.push(s.trim_end().to_string());
                }
                true
            })?;
            transfer.write_function(|d| {
                body.extend_from_slice(d);
                Ok(d.len())
            })?;
            transfer.perform()?;
        }

        let status = easy.response_code()?;
        if !(200..300).contains(&status) {
            return Err(TransferError::Http {
                code: status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        etag_from_headers(&headers).ok_or_else(|| {
            TransferError::Malformed(format!("part {number} response carries no ETag"))
        })
    }

    /// Finalize the session with its ordered tag list. Consumes the session
    /// and returns the raw status; the caller judges success, since the
    /// local-cleanup decision hangs on it.
    pub fn complete(&self, session: UploadSession) -> Result<u32, TransferError> {
        let url = format!(
            "{}?uploadId={}",
            self.object_url(session.key()),
            session.upload_id()
        );
        let mut easy = self.handle(&url)?;
        easy.post(true)?;
        easy.post_fields_copy(session.complete_body().as_bytes())?;
        let mut list = curl::easy::List::new();
        list.append("Content-Type: application/xml")?;
        easy.http_headers(list)?;
        let resp = perform_collecting(easy)?;
        Ok(resp.status)
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }

    fn handle(&self, url: &str) -> Result<curl::easy::Easy, curl::Error> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.username(&self.credentials.username)?;
        easy.password(&self.credentials.secret)?;
        easy.connect_timeout(Duration::from_secs(15))?;
        // Parts are tens of MiB; give each call the same generous cap as
        // the download stream.
        easy.timeout(Duration::from_secs(3600))?;
        Ok(easy)
    }
}

/// Pull the text of `<tag>...</tag>` out of a small XML body.
pub(crate) fn extract_tag(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(body[start..end].trim().to_string())
}

/// ETag response header, quotes stripped.
fn etag_from_headers(lines: &[String]) -> Option<String> {
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("etag") {
                return Some(value.trim().trim_matches('"').to_string());
            }
        }
    }
    None
}
