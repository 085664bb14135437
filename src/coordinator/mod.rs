//! Request coordination: dispatch, caching, coalescing, and retry.
//!
//! [`RequestCoordinator`] is the single entry point for all storefront API
//! calls. Read requests are served from the response cache when a valid
//! entry exists, collapsed onto an already-running transfer for the same
//! key when one is in flight, and otherwise executed with bounded retry
//! and exponential backoff. Mutating requests always execute fresh.
//!
//! The coordinator is constructed once by the application's composition
//! root and handed to callers by clone (clones share all state).

mod types;

pub use types::{ApiResponse, Method, RequestOptions};

use crate::auth::CredentialSource;
use crate::cache::{CacheStats, ResponseCache};
use crate::coalesce::{CoalesceStats, InFlightTable, Registration};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::interpret::{Replay, ResponseInterpreter};
use crate::key::RequestKey;
use crate::transport::{TransferRequest, Transport};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Coordinates all API requests for one storefront backend.
///
/// Generic over its three injected collaborators: the transfer primitive,
/// the response interpreter, and the credential source. See the module
/// docs for dispatch semantics.
pub struct RequestCoordinator<T, I, C> {
    inner: Arc<Inner<T, I, C>>,
}

impl<T, I, C> Clone for RequestCoordinator<T, I, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Shared state behind every clone of the coordinator.
struct Inner<T, I, C> {
    config: ClientConfig,
    transport: T,
    interpreter: I,
    credentials: C,
    cache: ResponseCache,
    in_flight: InFlightTable,
}

/// Outcome of a single transfer attempt, before retry policy is applied.
enum AttemptOutcome {
    /// The server signalled "too many requests"; wait and re-run the same
    /// attempt slot
    RateLimited { wait: Duration },
    /// The interpreter produced a decoded payload
    Settled(Value),
}

impl<T, I, C> RequestCoordinator<T, I, C>
where
    T: Transport + 'static,
    I: ResponseInterpreter + 'static,
    C: CredentialSource + 'static,
{
    /// Create a coordinator from its configuration and collaborators.
    pub fn new(config: ClientConfig, transport: T, interpreter: I, credentials: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                interpreter,
                credentials,
                cache: ResponseCache::new(),
                in_flight: InFlightTable::new(),
            }),
        }
    }

    /// Issue a read request.
    ///
    /// Served from the cache when a valid entry exists; otherwise joins an
    /// in-flight transfer for the same key, or starts one.
    pub async fn get(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::Get, endpoint, None, options).await
    }

    /// Issue a POST request. Never cached, never coalesced.
    pub async fn post(
        &self,
        endpoint: &str,
        body: Value,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::Post, endpoint, Some(body), options)
            .await
    }

    /// Issue a PUT request. Never cached, never coalesced.
    pub async fn put(
        &self,
        endpoint: &str,
        body: Value,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::Put, endpoint, Some(body), options)
            .await
    }

    /// Issue a DELETE request. Never cached, never coalesced.
    pub async fn delete(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::Delete, endpoint, None, options).await
    }

    /// Dispatch a request through the cache, the in-flight table, and the
    /// retry loop.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let started = Instant::now();

        // Mutations: always a fresh transfer, no cache, no coalescing
        if !method.is_read() {
            let data = self
                .inner
                .execute_with_retry(method, endpoint, body, &options)
                .await?;
            return Ok(ApiResponse::new(data, false, false, started.elapsed()));
        }

        let key = RequestKey::derive(method, endpoint, options.params.as_ref());

        if let Some(data) = self.inner.cache.get(&key) {
            debug!(key = %key, "serving cached response");
            return Ok(ApiResponse::new(data, true, false, started.elapsed()));
        }

        match self.inner.in_flight.register(key.clone()) {
            Registration::Joined(mut rx) => {
                // A joiner's own cancellation abandons the wait without
                // affecting the shared transfer
                tokio::select! {
                    _ = options.cancellation.cancelled() => Err(ApiError::Cancelled),
                    outcome = rx.recv() => match outcome {
                        Ok(result) => {
                            result.map(|data| ApiResponse::new(data, false, true, started.elapsed()))
                        }
                        Err(_) => Err(ApiError::Transfer(
                            "in-flight transfer dropped before settling".to_string(),
                        )),
                    },
                }
            }
            Registration::Leader => {
                // Spawned so the transfer settles and the in-flight entry is
                // removed even if this caller stops waiting
                let inner = Arc::clone(&self.inner);
                let task_key = key;
                let task_endpoint = endpoint.to_string();
                let task_options = options;
                let handle = tokio::spawn(async move {
                    let result = inner
                        .execute_with_retry(method, &task_endpoint, body, &task_options)
                        .await;

                    if let Ok(data) = &result {
                        let ttl = task_options
                            .cache_ttl
                            .unwrap_or_else(|| inner.config.cache_ttl());
                        inner.cache.insert(task_key.clone(), Arc::clone(data), ttl);
                    }

                    inner.in_flight.complete(&task_key, result.clone());
                    result
                });

                match handle.await {
                    Ok(result) => {
                        result.map(|data| ApiResponse::new(data, false, false, started.elapsed()))
                    }
                    Err(_) => Err(ApiError::Transfer("transfer task aborted".to_string())),
                }
            }
        }
    }

    /// Empty the entire response cache. In-flight transfers are unaffected.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Remove one cached entry. In-flight transfers are unaffected.
    pub fn clear_cache_key(&self, key: &RequestKey) {
        self.inner.cache.remove(key);
    }

    /// Returns the number of currently in-flight read transfers.
    pub fn pending_count(&self) -> usize {
        self.inner.in_flight.pending_count()
    }

    /// Returns a snapshot of the cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Returns a snapshot of the coalescing statistics.
    pub fn coalesce_stats(&self) -> CoalesceStats {
        self.inner.in_flight.stats()
    }

    /// The configuration this coordinator was constructed with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

impl<T, I, C> Inner<T, I, C>
where
    T: Transport,
    I: ResponseInterpreter,
    C: CredentialSource,
{
    /// Drive attempts `1..=max_retries` for one logical request.
    ///
    /// Rate-limited responses wait and re-run the same attempt slot without
    /// advancing the counter. Cancellation aborts immediately; so does an
    /// authorization failure on any attempt beyond the first. Exhaustion
    /// surfaces the last failure unmodified.
    async fn execute_with_retry(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        options: &RequestOptions,
    ) -> Result<Arc<Value>, ApiError> {
        let url = self.build_url(method, endpoint, options.params.as_ref());
        let timeout = options.timeout.unwrap_or_else(|| self.config.request_timeout());
        let max_retries = self.config.max_retries();
        let mut attempt: u32 = 1;

        loop {
            if options.cancellation.is_cancelled() {
                debug!(url = %url, "request cancelled before attempt");
                return Err(ApiError::Cancelled);
            }

            debug!(attempt, max_retries, method = %method, url = %url, "issuing transfer");

            let error = match self
                .attempt_once(attempt, method, &url, body.as_ref(), options, timeout)
                .await
            {
                Ok(AttemptOutcome::RateLimited { wait }) => {
                    warn!(
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "rate limited, waiting before re-running attempt"
                    );
                    if !self.sleep_unless_cancelled(wait, &options.cancellation).await {
                        return Err(ApiError::Cancelled);
                    }
                    // Same attempt slot: not counted toward max_retries
                    continue;
                }
                Ok(AttemptOutcome::Settled(payload)) => match application_failure(&payload) {
                    Some(message) => ApiError::Application(message),
                    None => return Ok(Arc::new(payload)),
                },
                Err(e) => e,
            };

            warn!(attempt, error = %error, "attempt failed");

            if error == ApiError::Cancelled {
                return Err(error);
            }
            if matches!(error, ApiError::Authorization(_)) && attempt > 1 {
                debug!(attempt, "authorization failure past first attempt, aborting");
                return Err(error);
            }
            if attempt >= max_retries {
                warn!(attempt, error = %error, "retries exhausted");
                return Err(error);
            }

            let backoff = self.config.base_retry_delay() * 2u32.pow(attempt - 1);
            debug!(
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                "backing off before retry"
            );
            if !self.sleep_unless_cancelled(backoff, &options.cancellation).await {
                return Err(ApiError::Cancelled);
            }
            attempt += 1;
        }
    }

    /// Run one transfer attempt: issue, classify rate limits, interpret.
    async fn attempt_once<'a>(
        &'a self,
        attempt: u32,
        method: Method,
        url: &'a str,
        body: Option<&'a Value>,
        options: &'a RequestOptions,
        timeout: Duration,
    ) -> Result<AttemptOutcome, ApiError> {
        let request = self.assemble_request(method, url, body, options);
        let response = self.issue(request, timeout, &options.cancellation).await?;

        if response.is_rate_limited() {
            // Honor the server's hint, else fall back to attempt * 2 seconds
            let wait = response
                .retry_after
                .map(Duration::from_secs)
                .unwrap_or_else(|| Duration::from_secs(u64::from(attempt) * 2));
            return Ok(AttemptOutcome::RateLimited { wait });
        }

        let replay = Replay::new(move || {
            Box::pin(async move {
                // Headers reassembled so a refreshed credential is picked up
                let request = self.assemble_request(method, url, body, options);
                self.issue(request, timeout, &options.cancellation).await
            })
        });

        let payload = self.interpreter.interpret(response, replay).await?;
        Ok(AttemptOutcome::Settled(payload))
    }

    /// Issue one transfer bounded by the per-attempt timeout and the
    /// caller's cancellation signal.
    async fn issue(
        &self,
        request: TransferRequest,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> Result<crate::transport::RawResponse, ApiError> {
        tokio::select! {
            _ = cancellation.cancelled() => Err(ApiError::Cancelled),
            result = tokio::time::timeout(timeout, self.transport.send(request)) => match result {
                Ok(response) => response,
                Err(_) => Err(ApiError::Transfer(format!(
                    "attempt timed out after {:?}",
                    timeout
                ))),
            },
        }
    }

    /// Sleep for the given duration; returns false if cancelled first.
    async fn sleep_unless_cancelled(
        &self,
        wait: Duration,
        cancellation: &CancellationToken,
    ) -> bool {
        tokio::select! {
            _ = cancellation.cancelled() => false,
            _ = tokio::time::sleep(wait) => true,
        }
    }

    /// Assemble the transfer configuration for one attempt.
    ///
    /// JSON content type by default, caller headers merged over it, and a
    /// bearer Authorization header when the credential source yields one.
    fn assemble_request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> TransferRequest {
        let mut headers: Vec<(String, String)> = Vec::new();

        let caller_sets_content_type = options
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-type"));
        if !caller_sets_content_type {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        headers.extend(options.headers.iter().cloned());

        if let Some(token) = self.credentials.bearer_token() {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }

        TransferRequest {
            method,
            url: url.to_string(),
            headers,
            body: body.cloned(),
        }
    }

    /// Resolve an endpoint path against the base URL, with query
    /// parameters appended for reads.
    fn build_url(&self, method: Method, endpoint: &str, params: Option<&Value>) -> String {
        let mut url = format!("{}{}", self.config.base_url(), endpoint);

        if method.is_read() {
            if let Some(Value::Object(map)) = params {
                if !map.is_empty() {
                    let query: Vec<String> = map
                        .iter()
                        .map(|(name, value)| match value {
                            Value::String(s) => format!("{}={}", name, s),
                            other => format!("{}={}", name, other),
                        })
                        .collect();
                    url.push('?');
                    url.push_str(&query.join("&"));
                }
            }
        }

        url
    }
}

/// Detect an explicit application-level failure flag in a decoded payload.
///
/// Returns the payload's message when `success` is literally `false`.
fn application_failure(payload: &Value) -> Option<String> {
    match payload.get("success") {
        Some(Value::Bool(false)) => Some(
            payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpret::StandardInterpreter;
    use crate::interpret::tests::MockRefresher;
    use crate::transport::{MockTransport, RawResponse, ScriptedTransport};
    use serde_json::json;

    struct NoAuth;

    impl CredentialSource for NoAuth {
        fn bearer_token(&self) -> Option<String> {
            None
        }
    }

    struct FixedToken(&'static str);

    impl CredentialSource for FixedToken {
        fn bearer_token(&self) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    fn coordinator<T: Transport + 'static>(
        transport: T,
    ) -> RequestCoordinator<T, StandardInterpreter<MockRefresher>, NoAuth> {
        let config = ClientConfig::new("http://localhost")
            .with_base_retry_delay(Duration::from_millis(1));
        RequestCoordinator::new(
            config,
            transport,
            StandardInterpreter::new(MockRefresher::succeeding()),
            NoAuth,
        )
    }

    fn ok_body() -> &'static str {
        r#"{"success": true, "items": [1, 2, 3]}"#
    }

    #[test]
    fn test_application_failure_detection() {
        assert_eq!(
            application_failure(&json!({"success": false, "message": "out of stock"})),
            Some("out of stock".to_string())
        );
        assert_eq!(
            application_failure(&json!({"success": false})),
            Some("request failed".to_string())
        );
        assert_eq!(application_failure(&json!({"success": true})), None);
        assert_eq!(application_failure(&json!({"items": []})), None);
    }

    #[test]
    fn test_build_url_without_params() {
        let client = coordinator(MockTransport::new(Ok(RawResponse::new(200, ok_body()))));
        let url = client.inner.build_url(Method::Get, "/products", None);
        assert_eq!(url, "http://localhost/products");
    }

    #[test]
    fn test_build_url_with_query_params() {
        let client = coordinator(MockTransport::new(Ok(RawResponse::new(200, ok_body()))));
        let params = json!({"category": "shoes", "page": 2});
        let url = client
            .inner
            .build_url(Method::Get, "/products", Some(&params));
        assert_eq!(url, "http://localhost/products?category=shoes&page=2");
    }

    #[test]
    fn test_build_url_ignores_params_for_mutations() {
        let client = coordinator(MockTransport::new(Ok(RawResponse::new(200, ok_body()))));
        let params = json!({"category": "shoes"});
        let url = client
            .inner
            .build_url(Method::Post, "/products", Some(&params));
        assert_eq!(url, "http://localhost/products");
    }

    #[test]
    fn test_assemble_request_default_content_type() {
        let client = coordinator(MockTransport::new(Ok(RawResponse::new(200, ok_body()))));
        let request = client.inner.assemble_request(
            Method::Get,
            "http://localhost/products",
            None,
            &RequestOptions::default(),
        );

        assert!(request
            .headers
            .contains(&("Content-Type".to_string(), "application/json".to_string())));
    }

    #[test]
    fn test_assemble_request_caller_content_type_wins() {
        let client = coordinator(MockTransport::new(Ok(RawResponse::new(200, ok_body()))));
        let options = RequestOptions::new().with_header("content-type", "text/plain");
        let request = client.inner.assemble_request(
            Method::Post,
            "http://localhost/products",
            None,
            &options,
        );

        let content_types: Vec<_> = request
            .headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .collect();
        assert_eq!(content_types.len(), 1);
        assert_eq!(content_types[0].1, "text/plain");
    }

    #[test]
    fn test_assemble_request_attaches_bearer_token() {
        let config = ClientConfig::new("http://localhost");
        let client = RequestCoordinator::new(
            config,
            MockTransport::new(Ok(RawResponse::new(200, ok_body()))),
            StandardInterpreter::new(MockRefresher::succeeding()),
            FixedToken("secret"),
        );

        let request = client.inner.assemble_request(
            Method::Get,
            "http://localhost/products",
            None,
            &RequestOptions::default(),
        );

        assert!(request
            .headers
            .contains(&("Authorization".to_string(), "Bearer secret".to_string())));
    }

    #[test]
    fn test_assemble_request_no_token_no_header() {
        let client = coordinator(MockTransport::new(Ok(RawResponse::new(200, ok_body()))));
        let request = client.inner.assemble_request(
            Method::Get,
            "http://localhost/products",
            None,
            &RequestOptions::default(),
        );

        assert!(!request
            .headers
            .iter()
            .any(|(name, _)| name == "Authorization"));
    }

    #[tokio::test]
    async fn test_get_returns_payload() {
        let client = coordinator(MockTransport::new(Ok(RawResponse::new(200, ok_body()))));

        let response = client.get("/products", RequestOptions::default()).await.unwrap();
        assert_eq!(*response.data, json!({"success": true, "items": [1, 2, 3]}));
        assert!(response.is_fresh());
    }

    #[tokio::test]
    async fn test_second_get_is_cache_hit() {
        let client = coordinator(MockTransport::new(Ok(RawResponse::new(200, ok_body()))));

        let first = client.get("/products", RequestOptions::default()).await.unwrap();
        let second = client.get("/products", RequestOptions::default()).await.unwrap();

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(client.inner.transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_post_never_cached() {
        let client = coordinator(MockTransport::new(Ok(RawResponse::new(200, ok_body()))));

        client
            .post("/cart", json!({"item": 7}), RequestOptions::default())
            .await
            .unwrap();
        client
            .post("/cart", json!({"item": 7}), RequestOptions::default())
            .await
            .unwrap();

        assert_eq!(client.inner.transport.call_count(), 2);
        assert!(client.inner.cache.is_empty());
    }

    #[tokio::test]
    async fn test_failed_read_not_cached() {
        let client = coordinator(MockTransport::new(Err(ApiError::Transfer(
            "connection refused".to_string(),
        ))));

        let result = client.get("/products", RequestOptions::default()).await;
        assert!(result.is_err());
        assert!(client.inner.cache.is_empty());
    }

    #[tokio::test]
    async fn test_application_failure_surfaced_with_message() {
        let body = r#"{"success": false, "message": "inventory unavailable"}"#;
        let client = coordinator(MockTransport::new(Ok(RawResponse::new(200, body))));

        let err = client
            .get("/products", RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Application("inventory unavailable".to_string())
        );
    }

    #[tokio::test]
    async fn test_clear_cache_key_forces_new_transfer() {
        let client = coordinator(MockTransport::new(Ok(RawResponse::new(200, ok_body()))));

        client.get("/products", RequestOptions::default()).await.unwrap();
        let key = RequestKey::derive(Method::Get, "/products", None);
        client.clear_cache_key(&key);
        client.get("/products", RequestOptions::default()).await.unwrap();

        assert_eq!(client.inner.transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_pre_cancelled_request_never_transfers() {
        let client = coordinator(MockTransport::new(Ok(RawResponse::new(200, ok_body()))));

        let token = CancellationToken::new();
        token.cancel();
        let options = RequestOptions::new().with_cancellation(token);

        let err = client.get("/products", options).await.unwrap_err();
        assert_eq!(err, ApiError::Cancelled);
        assert_eq!(client.inner.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_surfaces_last_failure() {
        let client = coordinator(ScriptedTransport::new(vec![
            Err(ApiError::Transfer("first".to_string())),
            Err(ApiError::Transfer("second".to_string())),
            Err(ApiError::Transfer("third".to_string())),
        ]));

        let err = client
            .get("/products", RequestOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err, ApiError::Transfer("third".to_string()));
        assert_eq!(client.inner.transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let client = coordinator(ScriptedTransport::new(vec![
            Err(ApiError::Transfer("reset".to_string())),
            Ok(RawResponse::new(200, ok_body())),
        ]));

        let response = client.get("/products", RequestOptions::default()).await.unwrap();
        assert_eq!(*response.data, json!({"success": true, "items": [1, 2, 3]}));
        assert_eq!(client.inner.transport.call_count(), 2);
    }
}
