//! In-memory transport used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::stream;

use crate::error::GatewayError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpStreamResponse, HttpTransport};

#[derive(Clone)]
struct Route {
    method: HttpMethod,
    path: String,
    status: u16,
    body: String,
}

/// Answers requests whose URL ends with a registered path; anything else is a 404.
#[derive(Default)]
pub(crate) struct RouteTransport {
    routes: Mutex<Vec<Route>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<HttpRequest>>,
}

impl RouteTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(self, method: HttpMethod, path: &str, status: u16, body: &str) -> Self {
        self.set_route(method, path, status, body);
        self
    }

    /// Replaces (or adds) the answer for `path`.
    pub(crate) fn set_route(&self, method: HttpMethod, path: &str, status: u16, body: &str) {
        let mut routes = self.routes.lock().expect("routes lock");
        routes.retain(|route| !(route.method == method && route.path == path));
        routes.push(Route {
            method,
            path: path.to_string(),
            status,
            body: body.to_string(),
        });
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.seen.lock().expect("seen lock").clone()
    }

    fn answer(&self, request: HttpRequest) -> (u16, String) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let found = self
            .routes
            .lock()
            .expect("routes lock")
            .iter()
            .find(|route| route.method == request.method && request.url.ends_with(&route.path))
            .map(|route| (route.status, route.body.clone()));
        self.seen.lock().expect("seen lock").push(request);
        found.unwrap_or((404, "not found".to_string()))
    }
}

#[async_trait]
impl HttpTransport for RouteTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, GatewayError> {
        let (status, body) = self.answer(request);
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: body.into_bytes(),
        })
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, GatewayError> {
        let (status, body) = self.answer(request);
        // one chunk per line so decoding crosses chunk boundaries
        let chunks: Vec<Result<Vec<u8>, GatewayError>> = body
            .split_inclusive('\n')
            .map(|line| Ok(line.as_bytes().to_vec()))
            .collect();
        Ok(HttpStreamResponse {
            status,
            headers: HashMap::new(),
            body: Box::pin(stream::iter(chunks)),
        })
    }
}
