//! Classify transfer errors into retry policy error kinds.
//!
//! Transient: connect/read timeouts, connection-level faults, truncated
//! bodies. Terminal: HTTP error statuses (range/auth/logic failures are not
//! network weather) and malformed responses.

use super::error::TransferError;
use super::policy::ErrorKind;

/// Classify a curl error for retry decisions.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_partial_file() {
        return ErrorKind::Truncated;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

/// Classify a transfer error into an ErrorKind.
pub fn classify(e: &TransferError) -> ErrorKind {
    match e {
        TransferError::Curl(ce) => classify_curl_error(ce),
        TransferError::Truncated { .. } => ErrorKind::Truncated,
        TransferError::Http { .. } | TransferError::Malformed(_) => ErrorKind::Other,
    }
}
