//! Request and response types for the coordination layer.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// HTTP method of a logical request.
///
/// Only `GET` is a read: reads are cached and coalesced, mutations are
/// neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Returns true if the method is idempotent-safe to cache and collapse.
    pub fn is_read(self) -> bool {
        matches!(self, Method::Get)
    }

    /// Returns the canonical uppercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-call options for a dispatched request.
///
/// Everything here is optional; defaults come from the client
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra header name/value pairs merged over the defaults
    pub headers: Vec<(String, String)>,
    /// Query parameters; also part of the request identity key
    pub params: Option<Value>,
    /// Per-attempt timeout override
    pub timeout: Option<Duration>,
    /// Cache validity override for this request's response
    pub cache_ttl: Option<Duration>,
    /// Caller-supplied cancellation signal
    pub cancellation: CancellationToken,
}

impl RequestOptions {
    /// Create options with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header to merge over the defaults.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the query parameters.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Override the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the cache validity window for this request.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Attach a cancellation signal.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// Resolved result of a dispatched request.
///
/// Carries the decoded payload and metadata about how it was obtained.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// The decoded payload, shared cheaply between coalesced callers.
    pub data: Arc<Value>,

    /// Whether this was served from the cache without network access.
    pub cache_hit: bool,

    /// Whether this call joined another caller's in-flight transfer.
    pub shared: bool,

    /// How long the call took, queueing included.
    pub duration: Duration,
}

impl ApiResponse {
    /// Creates a new response.
    pub fn new(data: Arc<Value>, cache_hit: bool, shared: bool, duration: Duration) -> Self {
        Self {
            data,
            cache_hit,
            shared,
            duration,
        }
    }

    /// Returns true if the payload came over the network on this call.
    pub fn is_fresh(&self) -> bool {
        !self.cache_hit && !self.shared
    }
}
