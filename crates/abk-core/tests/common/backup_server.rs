//! Minimal scripted HTTP/1.1 server for integration tests.
//!
//! Serves the vendor API (start/progress), a range-capable artifact
//! download with optional mid-stream fault injection, and the multipart
//! store triple (initiate/part/complete). Every request is recorded so
//! tests can assert on counts, offsets and part ordering. One request per
//! connection; responses carry `Connection: close`.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// One scripted progress response. The last `Body` repeats once the script
/// is exhausted.
#[derive(Debug, Clone)]
pub enum ProgressStep {
    /// Respond 200 with this JSON body.
    Body(String),
    /// Respond with this status and body.
    Status(u32, String),
    /// Close the connection without answering (transient network fault).
    Drop,
}

#[derive(Debug, Clone)]
pub struct BackupServerOptions {
    /// Status and body for the Confluence start endpoint.
    pub confluence_start: (u32, String),
    /// Status and body for the Jira start endpoint.
    pub jira_start: (u32, String),
    pub confluence_progress: Vec<ProgressStep>,
    pub jira_progress: Vec<ProgressStep>,
    /// Artifact bytes served for both download paths.
    pub artifact: Vec<u8>,
    /// When non-zero, artifact GETs answer with this error status instead.
    pub download_status: u32,
    /// Close the artifact stream after this many body bytes for the first
    /// `fail_times` GETs (announced length stays full).
    pub fail_after: Option<u64>,
    pub fail_times: u32,
    /// Status for the multipart finalize call.
    pub complete_status: u32,
    /// Drop the first N part PUTs before answering.
    pub part_drop_times: u32,
}

impl Default for BackupServerOptions {
    fn default() -> Self {
        Self {
            confluence_start: (200, "{}".to_string()),
            jira_start: (200, r#"{"taskId": "10029"}"#.to_string()),
            confluence_progress: Vec::new(),
            jira_progress: Vec::new(),
            artifact: Vec::new(),
            download_status: 0,
            fail_after: None,
            fail_times: 0,
            complete_status: 200,
            part_drop_times: 0,
        }
    }
}

/// Everything the server saw, for assertions.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub confluence_starts: u32,
    pub jira_starts: u32,
    pub confluence_progress_requests: u32,
    pub jira_progress_requests: u32,
    /// Query strings seen on Jira progress requests.
    pub jira_progress_queries: Vec<String>,
    /// Range start offsets of artifact GETs, in arrival order.
    pub download_offsets: Vec<u64>,
    /// Object keys (paths) of initiated multipart sessions.
    pub initiated_keys: Vec<String>,
    /// Successfully received parts: (part number, bytes).
    pub parts: Vec<(u32, Vec<u8>)>,
    /// Bodies of finalize calls.
    pub complete_bodies: Vec<String>,
}

struct ServerState {
    opts: BackupServerOptions,
    confluence_progress: Mutex<VecDeque<ProgressStep>>,
    jira_progress: Mutex<VecDeque<ProgressStep>>,
    confluence_last: Mutex<Option<ProgressStep>>,
    jira_last: Mutex<Option<ProgressStep>>,
    download_fails_left: AtomicU32,
    part_drops_left: AtomicU32,
    recorded: Mutex<Recorded>,
}

pub struct BackupServer {
    /// Base URL, e.g. "http://127.0.0.1:39321".
    pub base_url: String,
    state: Arc<ServerState>,
}

impl BackupServer {
    /// Start the server on a random loopback port. Runs until the test
    /// process exits.
    pub fn start(opts: BackupServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(ServerState {
            confluence_progress: Mutex::new(opts.confluence_progress.clone().into()),
            jira_progress: Mutex::new(opts.jira_progress.clone().into()),
            confluence_last: Mutex::new(None),
            jira_last: Mutex::new(None),
            download_fails_left: AtomicU32::new(opts.fail_times),
            part_drops_left: AtomicU32::new(opts.part_drop_times),
            recorded: Mutex::new(Recorded::default()),
            opts,
        });
        let accept_state = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&accept_state);
                thread::spawn(move || handle(stream, &state));
            }
        });
        BackupServer {
            base_url: format!("http://127.0.0.1:{port}"),
            state,
        }
    }

    pub fn recorded(&self) -> Recorded {
        self.state.recorded.lock().unwrap().clone()
    }
}

struct Request {
    method: String,
    path: String,
    query: String,
    range_start: Option<u64>,
    body: Vec<u8>,
}

fn handle(mut stream: TcpStream, state: &ServerState) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(5)));
    let req = match read_request(&mut stream, state) {
        Some(r) => r,
        None => return,
    };
    let Request {
        method,
        path,
        query,
        range_start,
        body,
    } = req;

    match (method.as_str(), path.as_str()) {
        ("POST", "/wiki/rest/obm/1.0/runbackup") => {
            state.recorded.lock().unwrap().confluence_starts += 1;
            let (status, body) = state.opts.confluence_start.clone();
            respond(&mut stream, status, "application/json", &[], body.as_bytes());
        }
        ("POST", "/rest/backup/1/export/runbackup") => {
            state.recorded.lock().unwrap().jira_starts += 1;
            let (status, body) = state.opts.jira_start.clone();
            respond(&mut stream, status, "application/json", &[], body.as_bytes());
        }
        ("GET", "/wiki/rest/obm/1.0/getprogress") => {
            state.recorded.lock().unwrap().confluence_progress_requests += 1;
            let step = next_step(&state.confluence_progress, &state.confluence_last);
            serve_progress(&mut stream, step);
        }
        ("GET", "/rest/backup/1/export/getProgress") => {
            {
                let mut rec = state.recorded.lock().unwrap();
                rec.jira_progress_requests += 1;
                rec.jira_progress_queries.push(query.clone());
            }
            let step = next_step(&state.jira_progress, &state.jira_last);
            serve_progress(&mut stream, step);
        }
        ("GET", p) if p.starts_with("/wiki/download/") || p.starts_with("/plugins/servlet/") => {
            serve_artifact(&mut stream, state, range_start);
        }
        ("POST", _) if has_param(&query, "uploads") => {
            state
                .recorded
                .lock()
                .unwrap()
                .initiated_keys
                .push(path.clone());
            let body = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                 <InitiateMultipartUploadResult>\
                 <UploadId>test-upload-id</UploadId>\
                 </InitiateMultipartUploadResult>";
            respond(&mut stream, 200, "application/xml", &[], body.as_bytes());
        }
        ("PUT", _) if param_value(&query, "partNumber").is_some() => {
            let number: u32 = param_value(&query, "partNumber")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            state.recorded.lock().unwrap().parts.push((number, body));
            let etag = format!("ETag: \"etag-{number}\"");
            respond(&mut stream, 200, "application/xml", &[&etag], b"");
        }
        ("POST", _) if param_value(&query, "uploadId").is_some() => {
            state
                .recorded
                .lock()
                .unwrap()
                .complete_bodies
                .push(String::from_utf8_lossy(&body).into_owned());
            respond(
                &mut stream,
                state.opts.complete_status,
                "application/xml",
                &[],
                b"<CompleteMultipartUploadResult/>",
            );
        }
        _ => respond(&mut stream, 404, "text/plain", &[], b"not found"),
    }
}

/// Pop the next scripted step; the last `Body`/`Status` repeats forever.
fn next_step(
    queue: &Mutex<VecDeque<ProgressStep>>,
    last: &Mutex<Option<ProgressStep>>,
) -> ProgressStep {
    if let Some(step) = queue.lock().unwrap().pop_front() {
        if !matches!(step, ProgressStep::Drop) {
            *last.lock().unwrap() = Some(step.clone());
        }
        return step;
    }
    last.lock()
        .unwrap()
        .clone()
        .unwrap_or_else(|| ProgressStep::Body("{}".to_string()))
}

fn serve_progress(stream: &mut TcpStream, step: ProgressStep) {
    match step {
        ProgressStep::Drop => (), // close without answering
        ProgressStep::Body(body) => {
            respond(stream, 200, "application/json", &[], body.as_bytes())
        }
        ProgressStep::Status(status, body) => {
            respond(stream, status, "application/json", &[], body.as_bytes())
        }
    }
}

fn serve_artifact(stream: &mut TcpStream, state: &ServerState, range_start: Option<u64>) {
    let start = range_start.unwrap_or(0);
    state.recorded.lock().unwrap().download_offsets.push(start);

    if state.opts.download_status != 0 {
        respond(
            stream,
            state.opts.download_status,
            "text/plain",
            &[],
            b"denied",
        );
        return;
    }

    let body = &state.opts.artifact;
    let total = body.len() as u64;
    if start > total {
        let header = format!("Content-Range: bytes */{total}");
        respond(stream, 416, "text/plain", &[&header], b"");
        return;
    }
    let slice = &body[start as usize..];
    let content_range = format!(
        "Content-Range: bytes {}-{}/{}",
        start,
        total.saturating_sub(1),
        total
    );
    let status = if range_start.is_some() { 206 } else { 200 };

    // Announce the full remaining length, then optionally cut the body
    // short to simulate a dropped connection mid-stream.
    let cut = if state.opts.fail_after.is_some() && state.take_token(&state.download_fails_left) {
        state.opts.fail_after.map(|n| (n as usize).min(slice.len()))
    } else {
        None
    };

    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\n{}\r\nAccept-Ranges: bytes\r\nConnection: close\r\n\r\n",
        status,
        reason(status),
        slice.len(),
        content_range
    );
    let _ = stream.write_all(head.as_bytes());
    match cut {
        Some(n) => {
            let _ = stream.write_all(&slice[..n]);
        }
        None => {
            let _ = stream.write_all(slice);
        }
    }
    let _ = stream.flush();
}

impl ServerState {
    /// Returns true (and decrements) while the counter is above zero.
    fn take_token(&self, counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .is_ok()
    }
}

fn respond(stream: &mut TcpStream, status: u32, content_type: &str, extra: &[&str], body: &[u8]) {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: {}\r\nConnection: close\r\n",
        status,
        reason(status),
        body.len(),
        content_type
    );
    for line in extra {
        head.push_str(line);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
    let _ = stream.flush();
}

fn reason(status: u32) -> &'static str {
    match status {
        200 => "OK",
        206 => "Partial Content",
        403 => "Forbidden",
        404 => "Not Found",
        416 => "Range Not Satisfiable",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

fn read_request(stream: &mut TcpStream, state: &ServerState) -> Option<Request> {
    let mut buf: Vec<u8> = Vec::new();
    let mut tmp = [0u8; 8192];
    let header_end = loop {
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut tmp).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
    };

    let head = std::str::from_utf8(&buf[..header_end]).ok()?;
    let mut lines = head.lines();
    let request_line = lines.next()?;
    let mut words = request_line.split_whitespace();
    let method = words.next()?.to_string();
    let target = words.next()?.to_string();
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), q.to_string()),
        None => (target.clone(), String::new()),
    };

    let mut content_length = 0usize;
    let mut range_start = None;
    let mut expect_continue = false;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            }
            if name.eq_ignore_ascii_case("range") {
                if let Some(rest) = value.strip_prefix("bytes=") {
                    if let Some((a, _)) = rest.split_once('-') {
                        range_start = a.trim().parse().ok();
                    }
                }
            }
            if name.eq_ignore_ascii_case("expect") {
                expect_continue = value.eq_ignore_ascii_case("100-continue");
            }
        }
    }

    // Simulated connection loss for part uploads happens before the body is
    // ever acknowledged.
    if method == "PUT"
        && param_value(&query, "partNumber").is_some()
        && state.take_token(&state.part_drops_left)
    {
        return None;
    }

    let mut body = buf[header_end + 4..].to_vec();
    if expect_continue && body.len() < content_length {
        let _ = stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n");
        let _ = stream.flush();
    }
    while body.len() < content_length {
        let n = stream.read(&mut tmp).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&tmp[..n]);
    }

    Some(Request {
        method,
        path,
        query,
        range_start,
        body,
    })
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn has_param(query: &str, name: &str) -> bool {
    query.split('&').any(|p| p == name || p.starts_with(&format!("{name}=")))
}

fn param_value<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query
        .split('&')
        .find_map(|p| p.strip_prefix(&format!("{name}=")))
}
