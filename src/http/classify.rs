//! Response classification
//!
//! Decides what the client does with a response before any records are read
//! from it: accept, refresh the token and retry, retry with backoff, or fail.

use crate::types::JsonValue;

/// Error code the API returns when the account is locked out.
///
/// Compared as an opaque token against the textual form of `code`.
pub const LOCKOUT_CODE: &str = "7602.1";

/// Outcome of validating one response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 2xx/3xx, records can be read
    Success,
    /// 401: the bearer token was rejected
    Unauthorized,
    /// Account locked out; never retried
    Lockout,
    /// Other 4xx; fatal for the request
    ClientError,
    /// 5xx; retried with backoff
    ServerError,
}

impl ResponseClass {
    /// Check if the request may be retried as-is
    pub fn is_retriable(self) -> bool {
        matches!(self, Self::ServerError)
    }

    /// Check if this class ends the whole run
    pub fn is_run_fatal(self) -> bool {
        matches!(self, Self::Lockout)
    }
}

/// Classify a response by status and (parsed) body
///
/// The lockout code wins over the HTTP status: it is fatal even on a 200.
pub fn classify(status: u16, body: Option<&JsonValue>) -> ResponseClass {
    if body.is_some_and(is_lockout) {
        return ResponseClass::Lockout;
    }

    match status {
        401 => ResponseClass::Unauthorized,
        400..=499 => ResponseClass::ClientError,
        500..=599 => ResponseClass::ServerError,
        _ => ResponseClass::Success,
    }
}

/// Check whether a body carries the lockout code
pub fn is_lockout(body: &JsonValue) -> bool {
    match body.get("code") {
        Some(JsonValue::Number(n)) => n.to_string() == LOCKOUT_CODE,
        Some(JsonValue::String(s)) => s == LOCKOUT_CODE,
        _ => false,
    }
}
