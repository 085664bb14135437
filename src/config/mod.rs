//! Client configuration.
//!
//! Configuration is supplied once at coordinator construction and is
//! immutable thereafter. Cache-clear operations do not touch it.

pub mod defaults;

use defaults::{
    DEFAULT_BASE_RETRY_DELAY_MS, DEFAULT_CACHE_TTL_SECS, DEFAULT_MAX_RETRIES,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use std::time::Duration;

/// Configuration for the request coordinator.
///
/// Groups all parameters needed to configure request execution, providing
/// sensible defaults while allowing customization.
///
/// # Example
///
/// ```
/// use shopwire::config::ClientConfig;
/// use std::time::Duration;
///
/// // Using defaults
/// let config = ClientConfig::new("https://api.example-shop.com");
/// assert_eq!(config.max_retries(), 3);
/// assert_eq!(config.cache_ttl(), Duration::from_secs(300));
///
/// // Custom configuration
/// let config = ClientConfig::new("https://api.example-shop.com")
///     .with_max_retries(5)
///     .with_request_timeout(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL all endpoint paths are resolved against
    base_url: String,
    /// Maximum number of attempts per request execution
    max_retries: u32,
    /// Delay before the first retry; doubles each attempt
    base_retry_delay: Duration,
    /// Validity window for cached read responses
    cache_ttl: Duration,
    /// Per-attempt transfer timeout
    request_timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration with default values for the given base URL.
    ///
    /// A trailing slash on the base URL is stripped so endpoint paths can
    /// always be written with a leading slash.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            max_retries: DEFAULT_MAX_RETRIES,
            base_retry_delay: Duration::from_millis(DEFAULT_BASE_RETRY_DELAY_MS),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Set the maximum number of attempts per request execution.
    ///
    /// Default: 3 attempts.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the base retry delay.
    ///
    /// The delay before attempt N+1 is `base_retry_delay * 2^(N-1)`.
    /// Default: 1 second.
    pub fn with_base_retry_delay(mut self, delay: Duration) -> Self {
        self.base_retry_delay = delay;
        self
    }

    /// Set the default validity window for cached read responses.
    ///
    /// Individual requests may override this per call. Default: 5 minutes.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the per-attempt transfer timeout.
    ///
    /// A timed-out attempt counts as a failed attempt subject to retry.
    /// Default: 10 seconds.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Get the base URL (no trailing slash).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the maximum number of attempts per request execution.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Get the base retry delay.
    pub fn base_retry_delay(&self) -> Duration {
        self.base_retry_delay
    }

    /// Get the default cache validity window.
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Get the per-attempt transfer timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}
