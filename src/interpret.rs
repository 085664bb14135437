//! Response interpretation and authentication recovery.
//!
//! The coordinator does not inspect response bodies itself. Every
//! non-rate-limited response is handed to an injected
//! [`ResponseInterpreter`] together with a [`Replay`] handle. The
//! interpreter detects authentication failures, drives the external
//! token-refresh flow, and may transparently re-issue the original
//! transfer exactly once.

use crate::error::ApiError;
use crate::transport::RawResponse;
use futures::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use tracing::{debug, warn};

/// One-shot handle that re-issues the original transfer.
///
/// Consuming `invoke` enforces the at-most-once replay contract at the type
/// level. The re-issued transfer assembles its headers freshly, so a
/// credential refreshed in the meantime is picked up.
pub struct Replay<'a> {
    run: Box<dyn FnOnce() -> BoxFuture<'a, Result<RawResponse, ApiError>> + Send + 'a>,
}

impl<'a> Replay<'a> {
    /// Wrap a thunk that re-issues the original transfer.
    pub fn new(
        run: impl FnOnce() -> BoxFuture<'a, Result<RawResponse, ApiError>> + Send + 'a,
    ) -> Self {
        Self { run: Box::new(run) }
    }

    /// Re-issue the original transfer.
    pub async fn invoke(self) -> Result<RawResponse, ApiError> {
        (self.run)().await
    }
}

/// External capability that refreshes the stored credential.
///
/// Called only by the response interpreter, only after an authentication
/// failure. On success the refreshed token must be visible through the
/// coordinator's credential source.
pub trait TokenRefresher: Send + Sync {
    /// Refresh the credential, returning once the new token is stored.
    fn refresh(&self) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Injected collaborator that decodes raw responses.
///
/// Responsible for authentication-failure detection and at-most-one
/// transparent replay via the supplied handle.
pub trait ResponseInterpreter: Send + Sync {
    /// Decode a raw response into its payload.
    fn interpret<'a>(
        &'a self,
        response: RawResponse,
        replay: Replay<'a>,
    ) -> impl Future<Output = Result<Value, ApiError>> + Send + 'a;
}

/// Standard interpreter for the storefront API.
///
/// On an authentication failure it refreshes the credential and replays the
/// transfer once; a second rejection is surfaced as an authorization
/// failure. All other responses decode as JSON.
pub struct StandardInterpreter<R> {
    refresher: R,
}

impl<R: TokenRefresher> StandardInterpreter<R> {
    /// Create an interpreter delegating refreshes to the given capability.
    pub fn new(refresher: R) -> Self {
        Self { refresher }
    }
}

impl<R: TokenRefresher> ResponseInterpreter for StandardInterpreter<R> {
    async fn interpret<'a>(
        &'a self,
        response: RawResponse,
        replay: Replay<'a>,
    ) -> Result<Value, ApiError> {
        if response.is_auth_failure() {
            debug!("authentication failure, invoking token refresh");
            if let Err(e) = self.refresher.refresh().await {
                warn!(error = %e, "token refresh failed");
                return Err(ApiError::Authorization(format!(
                    "token refresh failed: {}",
                    e
                )));
            }

            let replayed = replay.invoke().await?;
            if replayed.is_auth_failure() {
                return Err(ApiError::Authorization(
                    "request rejected after token refresh".to_string(),
                ));
            }
            return decode(replayed);
        }

        decode(response)
    }
}

/// Decode a non-authentication response body as JSON.
fn decode(response: RawResponse) -> Result<Value, ApiError> {
    if !response.is_success() {
        return Err(ApiError::Transfer(format!("HTTP {}", response.status)));
    }

    serde_json::from_slice(&response.body)
        .map_err(|e| ApiError::InvalidResponse(format!("malformed JSON body: {}", e)))
}
