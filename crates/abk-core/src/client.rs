//! Authenticated HTTP client for the vendor API.
//!
//! Uses the curl crate (libcurl) with basic auth for the two JSON endpoint
//! roles (start job, get progress). These calls are expected to return
//! quickly, so timeouts are short; the download stream configures its own
//! long timeouts.

use std::time::Duration;

use crate::retry::TransferError;

/// Opaque, already-valid basic-auth tuple. Shared by the API client, the
/// download locator and the object store.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
}

/// Status and body of a completed API call.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u32,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One client per target lifecycle; holds the base URL and credentials.
pub struct ApiClient {
    base_url: String,
    credentials: Credentials,
}

impl ApiClient {
    pub fn new(base_url: &str, user_email: &str, api_token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: Credentials {
                username: user_email.to_string(),
                secret: api_token.to_string(),
            },
        }
    }

    /// Base URL including scheme, no trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// POST a JSON body; returns status and body without judging them.
    pub fn post_json(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<HttpResponse, TransferError> {
        let mut easy = self.handle(url)?;
        easy.post(true)?;
        easy.post_fields_copy(payload.to_string().as_bytes())?;
        perform_collecting(easy)
    }

    /// GET a JSON resource; returns status and body without judging them.
    pub fn get(&self, url: &str) -> Result<HttpResponse, TransferError> {
        let easy = self.handle(url)?;
        perform_collecting(easy)
    }

    fn handle(&self, url: &str) -> Result<curl::easy::Easy, curl::Error> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.username(&self.credentials.username)?;
        easy.password(&self.credentials.secret)?;
        easy.follow_location(true)?;
        easy.connect_timeout(Duration::from_secs(15))?;
        easy.timeout(Duration::from_secs(30))?;

        let mut list = curl::easy::List::new();
        list.append("Content-Type: application/json")?;
        list.append("Accept: application/json")?;
        easy.http_headers(list)?;
        Ok(easy)
    }
}

/// Run the transfer, collecting the response body into a string.
pub(crate) fn perform_collecting(mut easy: curl::easy::Easy) -> Result<HttpResponse, TransferError> {
    let mut body: Vec<u8> = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }
    let status = easy.response_code()?;
    Ok(HttpResponse {
        status,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}
