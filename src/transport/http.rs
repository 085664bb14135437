//! HTTP transport abstraction for testability.

use crate::coordinator::Method;
use crate::error::ApiError;
use crate::transport::{RawResponse, TransferRequest};
use std::future::Future;
use tracing::{debug, trace, warn};

/// Trait for issuing HTTP transfers.
///
/// This abstraction allows for dependency injection and easier testing by
/// enabling mock transports in tests. It uses non-blocking I/O via
/// async/await.
pub trait Transport: Send + Sync {
    /// Issues a single HTTP transfer.
    ///
    /// Implementations return the raw response for any status code; status
    /// interpretation (rate limits, authentication failures) belongs to the
    /// coordination layer and the response interpreter.
    fn send(
        &self,
        request: TransferRequest,
    ) -> impl Future<Output = Result<RawResponse, ApiError>> + Send;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn send(
        &self,
        request: TransferRequest,
    ) -> impl Future<Output = Result<RawResponse, ApiError>> + Send {
        self.as_ref().send(request)
    }
}

/// Default User-Agent string for HTTP transfers.
const DEFAULT_USER_AGENT: &str = concat!("shopwire/", env!("CARGO_PKG_VERSION"));

/// Real transport implementation using reqwest.
///
/// The cookie store is enabled so session credentials accompany every
/// transfer. Attempt timeouts are enforced by the coordinator, not here.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a new HttpTransport with default configuration.
    ///
    /// Connection pooling and TCP keepalive are tuned for a steady stream
    /// of small API calls.
    pub fn new() -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .cookie_store(true)
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ApiError::Transfer(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: TransferRequest) -> Result<RawResponse, ApiError> {
        trace!(method = %request.method, url = %request.url, "transfer starting");

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(resp) => {
                debug!(
                    url = %request.url,
                    status = resp.status().as_u16(),
                    "transfer response received"
                );
                resp
            }
            Err(e) => {
                warn!(
                    url = %request.url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "transfer failed"
                );
                return Err(ApiError::Transfer(format!("request failed: {}", e)));
            }
        };

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transfer(format!("failed to read response: {}", e)))?;

        trace!(url = %request.url, bytes = body.len(), "transfer body read");

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}
