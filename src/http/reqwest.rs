use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Method};

use crate::error::GatewayError;

use super::{
    DynHttpTransport, HttpBodyStream, HttpMethod, HttpRequest, HttpResponse, HttpStreamResponse,
    HttpTransport,
};

/// Label used for errors raised below the provider layer.
pub(crate) const TRANSPORT_LABEL: &str = "http";

/// Default [`HttpTransport`] backed by reqwest.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn default_client() -> Result<Self, GatewayError> {
        Client::builder().build().map(Self::new).map_err(|err| {
            GatewayError::provider(
                TRANSPORT_LABEL,
                format!("failed to create reqwest client: {err}"),
            )
        })
    }

    fn method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        }
    }

    fn build_request(
        &self,
        mut request: HttpRequest,
    ) -> Result<reqwest::RequestBuilder, GatewayError> {
        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url);

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        for (name, value) in request.headers.drain() {
            let header_name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| GatewayError::validation(format!("invalid header name: {err}")))?;
            let header_value = reqwest::header::HeaderValue::from_str(&value).map_err(|err| {
                GatewayError::validation(format!("invalid header value for {header_name}: {err}"))
            })?;
            builder = builder.header(header_name, header_value);
        }

        if let Some(body) = request.body.take() {
            builder = builder.body(body);
        }

        Ok(builder)
    }

    fn map_error(err: reqwest::Error, timeout: Option<Duration>) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout {
                provider: TRANSPORT_LABEL.to_string(),
                timeout_ms: timeout.map(|t| t.as_millis() as u64).unwrap_or_default(),
            }
        } else {
            GatewayError::provider(TRANSPORT_LABEL, err.to_string())
        }
    }

    fn headers_to_map(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, GatewayError> {
        let timeout = request.timeout;
        let limit = request.max_body_bytes;
        let response = self
            .build_request(request)?
            .send()
            .await
            .map_err(|err| Self::map_error(err, timeout))?;

        let status = response.status().as_u16();
        let headers = Self::headers_to_map(response.headers());

        if let (Some(limit), Some(length)) = (limit, response.content_length()) {
            if length as usize > limit {
                return Err(body_too_large(limit));
            }
        }

        let mut body = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let bytes = chunk.map_err(|err| Self::map_error(err, timeout))?;
            body.extend_from_slice(&bytes);
            if let Some(limit) = limit.filter(|limit| body.len() > *limit) {
                return Err(body_too_large(limit));
            }
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, GatewayError> {
        let timeout = request.timeout;
        let response = self
            .build_request(request)?
            .send()
            .await
            .map_err(|err| Self::map_error(err, timeout))?;

        let status = response.status().as_u16();
        let headers = Self::headers_to_map(response.headers());
        let stream = response.bytes_stream().map(move |chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|err| Self::map_error(err, timeout))
        });
        let body: HttpBodyStream = Box::pin(stream);

        Ok(HttpStreamResponse {
            status,
            headers,
            body,
        })
    }
}

fn body_too_large(limit: usize) -> GatewayError {
    GatewayError::invalid_response(
        TRANSPORT_LABEL,
        format!("response body exceeds {limit} bytes"),
    )
}

/// Builds a shareable reqwest transport.
pub fn default_dyn_transport() -> Result<DynHttpTransport, GatewayError> {
    Ok(Arc::new(ReqwestTransport::default_client()?))
}
