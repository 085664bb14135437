//! Error types for the request coordination layer.

use thiserror::Error;

/// Errors surfaced by request dispatch and execution.
///
/// The enum is `Clone` because a settled outcome is broadcast to every
/// caller that joined an in-flight transfer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Network or transport-level failure, including per-attempt timeouts
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// The decoded payload carried an explicit failure flag
    #[error("request failed: {0}")]
    Application(String),

    /// The response body could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Authentication could not be established or recovered
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// The caller's cancellation signal fired
    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// Returns true if the retry loop may re-attempt after this failure.
    ///
    /// `Authorization` is retryable only on the first attempt; the retry
    /// loop enforces that bound itself, so it is reported retryable here.
    /// `Cancelled` always terminates the loop.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transfer(_)
            | ApiError::Application(_)
            | ApiError::InvalidResponse(_)
            | ApiError::Authorization(_) => true,
            ApiError::Cancelled => false,
        }
    }
}
