//! Default values for client configuration.

/// Maximum number of attempts per request execution.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay before the first retry; doubles on each subsequent attempt.
pub const DEFAULT_BASE_RETRY_DELAY_MS: u64 = 1000;

/// Validity window for cached read responses.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 5 * 60;

/// Per-attempt transfer timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
