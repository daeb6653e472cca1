//! Per-provider HTTP execution: auth, timeouts, body ceilings, response caching,
//! cancellation, SSE streaming and error classification.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::config::{AuthScheme, ProviderAuth, TransportSettings};
use crate::error::GatewayError;
use crate::http::{DynHttpTransport, HttpBodyStream, HttpRequest, HttpResponse};
use crate::stream::SseStream;

pub mod cache;
mod classify;

pub use cache::{CacheEntry, ResponseCache};
pub use classify::ErrorMessageExtractor;

use classify::{classify_status, rescope};

/// Successful transport result.
#[derive(Debug, Clone)]
pub struct TransportResponse<T> {
    pub data: T,
    pub status: u16,
    pub headers: HashMap<String, String>,
}

impl<T> TransportResponse<T> {
    pub fn try_map<U, F>(self, f: F) -> Result<TransportResponse<U>, GatewayError>
    where
        F: FnOnce(T) -> Result<U, GatewayError>,
    {
        Ok(TransportResponse {
            data: f(self.data)?,
            status: self.status,
            headers: self.headers,
        })
    }
}

/// Everything a [`ProviderTransport`] needs besides the HTTP client.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub provider: String,
    pub base_url: String,
    pub auth: ProviderAuth,
    pub settings: TransportSettings,
    pub extract_error: ErrorMessageExtractor,
}

/// Executes canonical requests against one backend.
///
/// Cheap to clone; clones share the response cache, which belongs to exactly one
/// provider instance.
#[derive(Clone)]
pub struct ProviderTransport {
    inner: Arc<Inner>,
}

struct Inner {
    http: DynHttpTransport,
    options: TransportOptions,
    cache: Mutex<ResponseCache<HttpResponse>>,
}

impl ProviderTransport {
    pub fn new(http: DynHttpTransport, options: TransportOptions) -> Self {
        let cache = ResponseCache::new(options.settings.cache_capacity, options.settings.cache_ttl);
        Self {
            inner: Arc::new(Inner {
                http,
                options,
                cache: Mutex::new(cache),
            }),
        }
    }

    pub fn provider(&self) -> &str {
        &self.inner.options.provider
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.inner.options.settings
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.options.base_url, path)
    }

    /// GET `path`, served from the response cache when a fresh entry exists.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&CancellationToken>,
    ) -> Result<TransportResponse<T>, GatewayError> {
        let request = HttpRequest::get(self.url(path));
        self.execute(request, true, token, Ok::<T, GatewayError>).await
    }

    /// GET `path` bypassing the cache and discarding the body.
    ///
    /// Used by health probes, which must hit the network every time.
    pub async fn probe(
        &self,
        path: &str,
        token: Option<&CancellationToken>,
    ) -> Result<u16, GatewayError> {
        let request = HttpRequest::get(self.url(path));
        let response = self.send(request, token).await?;
        Ok(response.status)
    }

    /// POST a JSON body to `path` and parse the JSON answer.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        token: Option<&CancellationToken>,
    ) -> Result<TransportResponse<T>, GatewayError> {
        self.post_json_with(path, body, token, Ok::<T, GatewayError>)
            .await
    }

    /// Like [`post_json`](Self::post_json), but runs `accept` over the parsed answer.
    ///
    /// Only answers `accept` maps to `Ok` are stored in the response cache, so a
    /// 200 carrying an in-band failure reaches the network again on the next call.
    pub async fn post_json_with<B, T, U, F>(
        &self,
        path: &str,
        body: &B,
        token: Option<&CancellationToken>,
        accept: F,
    ) -> Result<TransportResponse<U>, GatewayError>
    where
        B: Serialize,
        T: DeserializeOwned,
        F: FnOnce(T) -> Result<U, GatewayError>,
    {
        let request = HttpRequest::post_json(self.url(path), self.serialize(body)?);
        self.execute(request, true, token, accept).await
    }

    /// POST a JSON body and decode the answer as an SSE stream of `E`.
    ///
    /// Never consults the cache. A non-2xx answer is read (bounded) and classified
    /// before any event is produced.
    pub async fn post_stream<B: Serialize, E: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        token: Option<CancellationToken>,
    ) -> Result<SseStream<E>, GatewayError> {
        self.ensure_not_cancelled(token.as_ref())?;
        let mut request = HttpRequest::post_json(self.url(path), self.serialize(body)?);
        request.headers = self.headers(request.headers);
        request
            .headers
            .insert("Accept".to_string(), "text/event-stream".to_string());

        let settings = self.settings();
        let send = self.inner.http.send_stream(request);
        let response = self
            .guard(send, token.as_ref(), settings.timeout)
            .await?;

        if !(200..300).contains(&response.status) {
            // the error body is bounded by the same deadline and token as the headers
            let collect = collect_stream_text(response.body, settings.max_body_bytes);
            let text = self.guard(collect, token.as_ref(), settings.timeout).await?;
            return Err(self.classify(response.status, &response.headers, &text));
        }

        Ok(SseStream::new(response.body, self.provider()).with_cancellation(token))
    }

    pub fn cache_len(&self) -> usize {
        self.cache().len()
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    async fn execute<T, U, F>(
        &self,
        request: HttpRequest,
        use_cache: bool,
        token: Option<&CancellationToken>,
        accept: F,
    ) -> Result<TransportResponse<U>, GatewayError>
    where
        T: DeserializeOwned,
        F: FnOnce(T) -> Result<U, GatewayError>,
    {
        self.ensure_not_cancelled(token)?;
        let signature = request_signature(&request);

        if use_cache {
            let cached = self.cache().get(&signature).cloned();
            if let Some(response) = cached {
                debug!(provider = %self.provider(), url = %request.url, "response cache hit");
                return self.decode(response)?.try_map(accept);
            }
        }

        let response = self.send(request, token).await?;
        let accepted = self.decode(response.clone())?.try_map(accept)?;
        if use_cache {
            self.cache().insert(signature, response);
        }
        Ok(accepted)
    }

    /// Sends a complete request and fails on non-2xx statuses.
    async fn send(
        &self,
        mut request: HttpRequest,
        token: Option<&CancellationToken>,
    ) -> Result<HttpResponse, GatewayError> {
        self.ensure_not_cancelled(token)?;
        let settings = self.settings();
        request.headers = self.headers(request.headers);
        request.timeout = Some(settings.timeout);
        request.max_body_bytes = Some(settings.max_body_bytes);

        debug!(provider = %self.provider(), method = request.method.as_str(), url = %request.url, "sending request");
        let send = self.inner.http.send(request);
        let response = self.guard(send, token, settings.timeout).await?;
        if !response.is_success() {
            return Err(self.classify(response.status, &response.headers, &response.text_lossy()));
        }
        Ok(response)
    }

    /// Races `fut` against the timeout and the cancellation token.
    async fn guard<T, F>(
        &self,
        fut: F,
        token: Option<&CancellationToken>,
        timeout: Duration,
    ) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        let timed = tokio::time::timeout(timeout, fut);
        let outcome = match token {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(self.cancelled_error()),
                outcome = timed => outcome,
            },
            None => timed.await,
        };
        match outcome {
            Ok(result) => result.map_err(|err| rescope(err, self.provider(), timeout)),
            Err(_) => Err(GatewayError::Timeout {
                provider: self.provider().to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    fn decode<T: DeserializeOwned>(
        &self,
        response: HttpResponse,
    ) -> Result<TransportResponse<T>, GatewayError> {
        let data = serde_json::from_slice(&response.body).map_err(|err| {
            GatewayError::invalid_response(
                self.provider(),
                format!("failed to parse response body: {err}"),
            )
        })?;
        Ok(TransportResponse {
            data,
            status: response.status,
            headers: response.headers,
        })
    }

    fn serialize<B: Serialize>(&self, body: &B) -> Result<Vec<u8>, GatewayError> {
        let payload = serde_json::to_vec(body).map_err(|err| {
            GatewayError::validation(format!("failed to serialize request: {err}"))
        })?;
        let limit = self.settings().max_body_bytes;
        if payload.len() > limit {
            return Err(GatewayError::validation(format!(
                "request body of {} bytes exceeds the {limit} byte limit",
                payload.len()
            )));
        }
        Ok(payload)
    }

    /// Config headers, then per-call headers, then the bearer token.
    fn headers(&self, call_headers: HashMap<String, String>) -> HashMap<String, String> {
        let auth = &self.inner.options.auth;
        let mut headers = HashMap::from([("Accept".to_string(), "application/json".to_string())]);
        headers.extend(auth.headers.clone());
        headers.extend(call_headers);
        if auth.scheme == AuthScheme::ApiKey {
            if let Some(key) = auth.api_key.as_deref().filter(|key| !key.is_empty()) {
                headers.insert("Authorization".to_string(), format!("Bearer {key}"));
            }
        }
        headers
    }

    fn classify(&self, status: u16, headers: &HashMap<String, String>, body: &str) -> GatewayError {
        classify_status(
            self.provider(),
            status,
            headers,
            body,
            self.inner.options.extract_error,
        )
    }

    fn ensure_not_cancelled(&self, token: Option<&CancellationToken>) -> Result<(), GatewayError> {
        if token.is_some_and(CancellationToken::is_cancelled) {
            return Err(self.cancelled_error());
        }
        Ok(())
    }

    fn cancelled_error(&self) -> GatewayError {
        GatewayError::cancelled(format!("request to {} cancelled", self.provider()))
    }

    fn cache(&self) -> MutexGuard<'_, ResponseCache<HttpResponse>> {
        self.inner
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn request_signature(request: &HttpRequest) -> String {
    let body = request
        .body
        .as_deref()
        .map(String::from_utf8_lossy)
        .unwrap_or_default();
    format!("{} {}\n{}", request.method.as_str(), request.url, body)
}

async fn collect_stream_text(mut body: HttpBodyStream, limit: usize) -> Result<String, GatewayError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        bytes.extend_from_slice(&chunk?);
        if bytes.len() > limit {
            bytes.truncate(limit);
            break;
        }
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures_util::stream;
    use serde_json::{Value, json};

    use super::*;
    use crate::error::ErrorKind;
    use crate::http::{HttpStreamResponse, HttpTransport};

    struct ScriptedTransport {
        calls: AtomicUsize,
        status: u16,
        body: Vec<u8>,
        delay: Option<Duration>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                status,
                body: body.as_bytes().to_vec(),
                delay: None,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                status: 200,
                body: b"{}".to_vec(),
                delay: Some(delay),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().expect("lock").push(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(HttpResponse {
                status: self.status,
                headers: HashMap::from([("retry-after".to_string(), "3".to_string())]),
                body: self.body.clone(),
            })
        }

        async fn send_stream(
            &self,
            request: HttpRequest,
        ) -> Result<HttpStreamResponse, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().expect("lock").push(request);
            let body = self.body.clone();
            Ok(HttpStreamResponse {
                status: self.status,
                headers: HashMap::new(),
                body: Box::pin(stream::iter(vec![Ok(body)])),
            })
        }
    }

    fn transport_with(http: Arc<ScriptedTransport>, settings: TransportSettings) -> ProviderTransport {
        ProviderTransport::new(
            http,
            TransportOptions {
                provider: "test".to_string(),
                base_url: "http://backend".to_string(),
                auth: ProviderAuth {
                    scheme: AuthScheme::ApiKey,
                    api_key: Some("sk-test".to_string()),
                    base_url: Some("http://backend".to_string()),
                    headers: HashMap::from([("X-Title".to_string(), "gateway".to_string())]),
                },
                settings,
                extract_error: |_| None,
            },
        )
    }

    #[tokio::test]
    async fn already_cancelled_token_skips_network() {
        let http = ScriptedTransport::new(200, "{}");
        let transport = transport_with(http.clone(), TransportSettings::default());
        let token = CancellationToken::new();
        token.cancel();

        let err = transport
            .post_json::<_, Value>("/v1/chat/completions", &json!({}), Some(&token))
            .await
            .expect_err("cancelled");
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        let err = transport
            .post_stream::<_, Value>("/v1/chat/completions", &json!({}), Some(token))
            .await
            .err()
            .expect("cancelled stream");
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test]
    async fn successful_responses_are_cached_per_signature() {
        let http = ScriptedTransport::new(200, r#"{"ok":true}"#);
        let transport = transport_with(http.clone(), TransportSettings::default());

        let first: TransportResponse<Value> = transport.get_json("/v1/models", None).await.expect("ok");
        let second: TransportResponse<Value> = transport.get_json("/v1/models", None).await.expect("ok");
        assert_eq!(first.data, second.data);
        assert_eq!(first.status, 200);
        assert_eq!(http.calls(), 1);

        transport
            .get_json::<Value>("/v1/other", None)
            .await
            .expect("ok");
        assert_eq!(http.calls(), 2);
        assert_eq!(transport.cache_len(), 2);

        transport.probe("/v1/models", None).await.expect("probe");
        assert_eq!(http.calls(), 3);
    }

    #[tokio::test]
    async fn rejected_answers_are_not_cached() {
        let http = ScriptedTransport::new(200, r#"{"ok":false}"#);
        let transport = transport_with(http.clone(), TransportSettings::default());
        let reject = |data: Value| -> Result<Value, GatewayError> {
            if data["ok"] == json!(true) {
                Ok(data)
            } else {
                Err(GatewayError::invalid_response("test", "not ok"))
            }
        };
        for _ in 0..2 {
            let err = transport
                .post_json_with("/v1/chat/completions", &json!({}), None, reject)
                .await
                .expect_err("rejected");
            assert_eq!(err.kind(), ErrorKind::InvalidResponse);
        }
        assert_eq!(http.calls(), 2);
        assert_eq!(transport.cache_len(), 0);
    }

    #[tokio::test]
    async fn headers_merge_config_and_bearer_token() {
        let http = ScriptedTransport::new(200, "{}");
        let transport = transport_with(http.clone(), TransportSettings::default());
        transport
            .post_json::<_, Value>("/v1/chat/completions", &json!({"a": 1}), None)
            .await
            .expect("ok");

        let seen = http.seen.lock().expect("lock");
        let request = &seen[0];
        assert_eq!(request.url, "http://backend/v1/chat/completions");
        assert_eq!(request.headers.get("Authorization").map(String::as_str), Some("Bearer sk-test"));
        assert_eq!(request.headers.get("X-Title").map(String::as_str), Some("gateway"));
        assert_eq!(
            request.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(request.timeout, Some(Duration::from_millis(30_000)));
        assert_eq!(request.max_body_bytes, Some(50 * 1024 * 1024));
    }

    #[tokio::test]
    async fn error_statuses_are_classified_and_not_cached() {
        let http = ScriptedTransport::new(429, "too many requests");
        let transport = transport_with(http.clone(), TransportSettings::default());
        let err = transport
            .get_json::<Value>("/v1/models", None)
            .await
            .expect_err("rate limited");
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(transport.cache_len(), 0);
    }

    #[tokio::test]
    async fn malformed_json_is_an_invalid_response() {
        let http = ScriptedTransport::new(200, "<html>");
        let transport = transport_with(http, TransportSettings::default());
        let err = transport
            .get_json::<Value>("/v1/models", None)
            .await
            .expect_err("invalid");
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn oversized_request_body_is_rejected_before_sending() {
        let http = ScriptedTransport::new(200, "{}");
        let settings = TransportSettings {
            max_body_bytes: 8,
            ..TransportSettings::default()
        };
        let transport = transport_with(http.clone(), settings);
        let err = transport
            .post_json::<_, Value>("/v1/chat/completions", &json!({"long": "payload"}), None)
            .await
            .expect_err("too large");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out_with_configured_value() {
        let http = ScriptedTransport::slow(Duration::from_secs(10));
        let settings = TransportSettings {
            timeout: Duration::from_millis(250),
            ..TransportSettings::default()
        };
        let transport = transport_with(http, settings);
        let err = transport
            .get_json::<Value>("/v1/models", None)
            .await
            .expect_err("timeout");
        assert_eq!(err.timeout_ms(), Some(250));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_in_flight_request_returns_cancellation() {
        let http = ScriptedTransport::slow(Duration::from_secs(10));
        let transport = transport_with(http, TransportSettings::default());
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            canceller.cancel();
        });
        let err = transport
            .get_json::<Value>("/v1/models", Some(&token))
            .await
            .expect_err("cancelled");
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn stream_error_status_is_classified() {
        let http = ScriptedTransport::new(401, "bad key");
        let transport = transport_with(http, TransportSettings::default());
        let err = transport
            .post_stream::<_, Value>("/v1/chat/completions", &json!({}), None)
            .await
            .err()
            .expect("unauthorized");
        assert_eq!(err.kind(), ErrorKind::Auth);
    }
}
