#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use llm_gateway::GatewayError;
use llm_gateway::http::{HttpRequest, HttpResponse, HttpStreamResponse, HttpTransport};

/// Answers by exact URL; unknown URLs get a 404. Counts every call.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, (u16, String)>>,
    hanging: Mutex<HashSet<String>>,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .expect("routes")
            .insert(url.to_string(), (status, body.to_string()));
    }

    /// Streams from `url` deliver their body and then never finish.
    pub fn hang_after_body(&self, url: &str) {
        self.hanging.lock().expect("hanging").insert(url.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().expect("urls").clone()
    }

    fn answer(&self, request: &HttpRequest) -> (u16, String) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().expect("urls").push(request.url.clone());
        self.routes
            .lock()
            .expect("routes")
            .get(&request.url)
            .cloned()
            .unwrap_or((404, "not found".to_string()))
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, GatewayError> {
        let (status, body) = self.answer(&request);
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: body.into_bytes(),
        })
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, GatewayError> {
        let (status, body) = self.answer(&request);
        let chunks: Vec<Result<Vec<u8>, GatewayError>> = body
            .split_inclusive('\n')
            .map(|line| Ok(line.as_bytes().to_vec()))
            .collect();
        let hang = self.hanging.lock().expect("hanging").contains(&request.url);
        let body = if hang {
            stream::iter(chunks).chain(stream::pending()).boxed()
        } else {
            stream::iter(chunks).boxed()
        };
        Ok(HttpStreamResponse {
            status,
            headers: HashMap::new(),
            body,
        })
    }
}

pub fn local_models(entries: &[(&str, u32)]) -> String {
    let data: Vec<serde_json::Value> = entries
        .iter()
        .map(|(id, context)| serde_json::json!({ "id": id, "context_length": context }))
        .collect();
    serde_json::json!({ "data": data }).to_string()
}
