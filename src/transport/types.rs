//! Transport request and response types.

use crate::coordinator::Method;
use bytes::Bytes;
use serde_json::Value;

/// One fully assembled HTTP transfer, ready for a [`Transport`] to issue.
///
/// [`Transport`]: super::Transport
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL including any query string
    pub url: String,
    /// Header name/value pairs, already merged and deduplicated
    pub headers: Vec<(String, String)>,
    /// JSON body for mutating requests
    pub body: Option<Value>,
}

/// Transport-level response handed to the response interpreter.
///
/// Carries only what the coordination layer needs: the status code, the
/// rate-limit hint, and the undecoded body.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Parsed `Retry-After` header in seconds, when present
    pub retry_after: Option<u64>,
    /// Undecoded response body
    pub body: Bytes,
}

impl RawResponse {
    /// Create a response with the given status and body.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    /// Attach a `Retry-After` value in seconds.
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Returns true for 2xx status codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true if the status signals "too many requests".
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// Returns true if the status signals an authentication failure.
    pub fn is_auth_failure(&self) -> bool {
        self.status == 401
    }
}
