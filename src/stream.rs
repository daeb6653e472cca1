//! Server-Sent-Events decoding for streaming completions.
//!
//! The decoder is a lazy, finite [`Stream`]: feed it a byte stream and it yields one
//! `Result` per `data:` line. It is independent of the network stack, so tests drive
//! it with in-memory chunks.

use std::collections::VecDeque;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::error::GatewayError;
use crate::http::HttpBodyStream;

const DONE_MARKER: &[u8] = b"[DONE]";

type CancelFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Decodes `data: <json>` lines into `T`.
///
/// * `[DONE]` ends the stream without an error.
/// * A payload that fails to parse yields one [`GatewayError::InvalidResponse`] and
///   decoding continues with the next line.
/// * A body error or a cancellation yields one terminal error and ends the stream.
pub struct SseStream<T> {
    body: HttpBodyStream,
    buffer: Vec<u8>,
    pending: VecDeque<Result<T, GatewayError>>,
    provider: String,
    cancel: Option<CancelFuture>,
    finished: bool,
    _event: PhantomData<fn() -> T>,
}

// Fields are never pinned structurally.
impl<T> Unpin for SseStream<T> {}

impl<T: DeserializeOwned> SseStream<T> {
    pub fn new(body: HttpBodyStream, provider: impl Into<String>) -> Self {
        Self {
            body,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            provider: provider.into(),
            cancel: None,
            finished: false,
            _event: PhantomData,
        }
    }

    /// Stops decoding with a [`GatewayError::Cancelled`] once `token` fires.
    pub fn with_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token.map(|token| Box::pin(token.cancelled_owned()) as CancelFuture);
        self
    }

    fn drain_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
        buffer.iter().position(|b| *b == b'\n').map(|pos| {
            let mut line: Vec<u8> = buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            line
        })
    }

    fn handle_line(&mut self, line: &[u8]) {
        let Some(rest) = line.strip_prefix(b"data:") else {
            return;
        };
        let payload = rest.strip_prefix(b" ").unwrap_or(rest);
        if payload.iter().all(u8::is_ascii_whitespace) {
            return;
        }
        if payload.trim_ascii() == DONE_MARKER {
            debug!(provider = %self.provider, "stream finished with [DONE]");
            self.finished = true;
            return;
        }
        match serde_json::from_slice::<T>(payload) {
            Ok(event) => self.pending.push_back(Ok(event)),
            Err(err) => {
                warn!(provider = %self.provider, error = %err, "skipping malformed stream event");
                self.pending.push_back(Err(GatewayError::invalid_response(
                    self.provider.clone(),
                    format!("failed to parse stream event: {err}"),
                )));
            }
        }
    }

    fn poll_cancelled(&mut self, cx: &mut Context<'_>) -> bool {
        match self.cancel.as_mut() {
            Some(cancel) => cancel.as_mut().poll(cx).is_ready(),
            None => false,
        }
    }
}

impl<T: DeserializeOwned> Stream for SseStream<T> {
    type Item = Result<T, GatewayError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if !this.finished && this.poll_cancelled(cx) {
            this.finished = true;
            this.pending.clear();
            this.cancel = None;
            return Poll::Ready(Some(Err(GatewayError::cancelled(format!(
                "stream from {} cancelled",
                this.provider
            )))));
        }

        if let Some(item) = this.pending.pop_front() {
            return Poll::Ready(Some(item));
        }
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.extend_from_slice(&bytes);
                    while let Some(line) = Self::drain_line(&mut this.buffer) {
                        this.handle_line(&line);
                        if this.finished {
                            this.buffer.clear();
                            break;
                        }
                    }
                    if let Some(item) = this.pending.pop_front() {
                        return Poll::Ready(Some(item));
                    }
                    if this.finished {
                        return Poll::Ready(None);
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    if !this.buffer.is_empty() {
                        let line = std::mem::take(&mut this.buffer);
                        this.handle_line(&line);
                    }
                    return Poll::Ready(this.pending.pop_front());
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use futures_util::stream;
    use serde::Deserialize;

    use super::*;
    use crate::error::ErrorKind;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Event {
        id: String,
    }

    fn build_body(chunks: Vec<Result<Vec<u8>, GatewayError>>) -> HttpBodyStream {
        Box::pin(stream::iter(chunks))
    }

    #[tokio::test]
    async fn yields_events_in_order_and_stops_at_done() {
        let chunks = vec![Ok(
            b"data: {\"id\":\"1\"}\n\ndata: {\"id\":\"2\"}\n\ndata: [DONE]\n\n".to_vec(),
        )];
        let results: Vec<_> = SseStream::<Event>::new(build_body(chunks), "test")
            .collect()
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().expect("ok").id, "1");
        assert_eq!(results[1].as_ref().expect("ok").id, "2");
    }

    #[tokio::test]
    async fn malformed_event_does_not_stop_delivery() {
        let chunks = vec![Ok(
            b"data: {\"id\":\"1\"}\n\ndata: {not json}\n\ndata: {\"id\":\"3\"}\n\ndata: [DONE]\n\n"
                .to_vec(),
        )];
        let results: Vec<_> = SseStream::<Event>::new(build_body(chunks), "test")
            .collect()
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().expect("ok").id, "1");
        let err = results[1].as_ref().expect_err("malformed");
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
        assert_eq!(results[2].as_ref().expect("ok").id, "3");
    }

    #[tokio::test]
    async fn lines_are_buffered_across_chunk_boundaries() {
        let chunks = vec![
            Ok(b"data: {\"i".to_vec()),
            Ok(b"d\":\"split\"}\r".to_vec()),
            Ok(b"\n: keep-alive comment\n\ndata: [DO".to_vec()),
            Ok(b"NE]\n".to_vec()),
        ];
        let results: Vec<_> = SseStream::<Event>::new(build_body(chunks), "test")
            .collect()
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().expect("ok").id, "split");
    }

    #[tokio::test]
    async fn events_after_done_are_ignored() {
        let chunks = vec![
            Ok(b"data: [DONE]\n\ndata: {\"id\":\"late\"}\n\n".to_vec()),
            Ok(b"data: {\"id\":\"later\"}\n\n".to_vec()),
        ];
        let results: Vec<_> = SseStream::<Event>::new(build_body(chunks), "test")
            .collect()
            .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_terminal() {
        let chunks = vec![
            Ok(b"data: {\"id\":\"1\"}\n\n".to_vec()),
            Err(GatewayError::provider("test", "connection reset")),
            Ok(b"data: {\"id\":\"2\"}\n\n".to_vec()),
        ];
        let results: Vec<_> = SseStream::<Event>::new(build_body(chunks), "test")
            .collect()
            .await;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(
            results[1].as_ref().expect_err("terminal").kind(),
            ErrorKind::Provider
        );
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_flushed() {
        let chunks = vec![Ok(b"data: {\"id\":\"tail\"}".to_vec())];
        let results: Vec<_> = SseStream::<Event>::new(build_body(chunks), "test")
            .collect()
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().expect("ok").id, "tail");
    }

    #[tokio::test]
    async fn cancellation_yields_single_error_and_ends() {
        let token = CancellationToken::new();
        let body: HttpBodyStream = Box::pin(
            stream::iter(vec![Ok(b"data: {\"id\":\"1\"}\n\n".to_vec())]).chain(stream::pending()),
        );
        let mut decoder =
            SseStream::<Event>::new(body, "test").with_cancellation(Some(token.clone()));

        let first = decoder.next().await.expect("item").expect("ok");
        assert_eq!(first.id, "1");

        token.cancel();
        let err = decoder.next().await.expect("item").expect_err("cancelled");
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(decoder.next().await.is_none());
    }
}
