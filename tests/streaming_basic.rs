mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockTransport, local_models};
use futures_util::StreamExt;
use llm_gateway::config::{ProviderConfig, ProviderKind};
use llm_gateway::{
    CancellationToken, ChatCompletionRequest, ChatMessage, ErrorKind, FinishReason, LlmProvider,
    Provider, ProviderRegistry,
};

const COMPLETIONS: &str = "http://qwen/v1/chat/completions";

async fn ready_provider(http: &Arc<MockTransport>) -> Provider {
    http.route("http://qwen/v1/models", 200, &local_models(&[("qwen2.5:7b", 32_768)]));
    let config = ProviderConfig::new("qwen", ProviderKind::Local, "http://qwen");
    let provider = ProviderRegistry::new(http.clone())
        .create(&config)
        .expect("provider");
    provider.initialize().await.expect("initialize");
    provider
}

fn request() -> ChatCompletionRequest {
    ChatCompletionRequest::new("qwen2.5:7b", vec![ChatMessage::user("count to two")])
}

#[tokio::test]
async fn stream_delivers_chunks_then_stops_at_done() {
    let http = Arc::new(MockTransport::new());
    let provider = ready_provider(&http).await;
    http.route(
        COMPLETIONS,
        200,
        concat!(
            "data: {\"id\":\"1\",\"choices\":[{\"delta\":{\"content\":\"one\"}}]}\n\n",
            "data: {\"id\":\"2\",\"choices\":[{\"delta\":{\"content\":\" two\"},\"finish_reason\":\"stop\"}],",
            "\"usage\":{\"prompt_tokens\":4,\"completion_tokens\":2,\"total_tokens\":6}}\n\n",
            "data: [DONE]\n\n",
            "data: {\"id\":\"3\",\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        ),
    );

    let items: Vec<_> = provider.chat_completion_stream(request(), None).collect().await;
    assert_eq!(items.len(), 2);
    let first = items[0].as_ref().expect("first chunk");
    let second = items[1].as_ref().expect("second chunk");
    assert_eq!(first.id, "1");
    assert_eq!(second.content.as_deref(), Some(" two"));
    assert_eq!(second.finish_reason, Some(FinishReason::Stop));
    assert_eq!(second.usage.map(|u| u.total_tokens), Some(6));
}

#[tokio::test]
async fn malformed_event_is_reported_and_skipped() {
    let http = Arc::new(MockTransport::new());
    let provider = ready_provider(&http).await;
    http.route(
        COMPLETIONS,
        200,
        "data: {\"id\":\"1\"}\n\ndata: {not json}\n\ndata: {\"id\":\"2\"}\n\ndata: [DONE]\n\n",
    );

    let items: Vec<_> = provider.chat_completion_stream(request(), None).collect().await;
    assert_eq!(items.len(), 3);
    assert!(items[0].is_ok());
    assert_eq!(
        items[1].as_ref().err().map(|err| err.kind()),
        Some(ErrorKind::InvalidResponse)
    );
    assert_eq!(items[2].as_ref().expect("last chunk").id, "2");
}

#[tokio::test]
async fn error_status_yields_one_terminal_error() {
    let http = Arc::new(MockTransport::new());
    let provider = ready_provider(&http).await;
    http.route(COMPLETIONS, 401, "{\"error\":{\"message\":\"bad key\"}}");

    let items: Vec<_> = provider.chat_completion_stream(request(), None).collect().await;
    assert_eq!(items.len(), 1);
    let err = items[0].as_ref().expect_err("auth failure");
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert!(err.to_string().contains("bad key"));
}

#[tokio::test]
async fn uninitialized_provider_streams_a_single_error() {
    let http = Arc::new(MockTransport::new());
    let config = ProviderConfig::new("qwen", ProviderKind::Local, "http://qwen");
    let provider = ProviderRegistry::new(http.clone())
        .create(&config)
        .expect("provider");

    let items: Vec<_> = provider.chat_completion_stream(request(), None).collect().await;
    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0].as_ref().err().map(|err| err.kind()),
        Some(ErrorKind::Unavailable)
    );
    assert_eq!(http.calls(), 0);
}

#[tokio::test]
async fn cancelling_mid_stream_ends_with_cancellation() {
    let http = Arc::new(MockTransport::new());
    let provider = ready_provider(&http).await;
    http.route(
        COMPLETIONS,
        200,
        "data: {\"id\":\"1\",\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n",
    );
    http.hang_after_body(COMPLETIONS);

    let token = CancellationToken::new();
    let mut stream = provider.chat_completion_stream(request(), Some(token.clone()));
    let first = stream.next().await.expect("first item").expect("first chunk");
    assert_eq!(first.content.as_deref(), Some("partial"));

    token.cancel();
    let err = stream
        .next()
        .await
        .expect("cancellation item")
        .expect_err("cancelled");
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(stream.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn cancelling_while_error_body_stalls_ends_with_cancellation() {
    let http = Arc::new(MockTransport::new());
    let provider = ready_provider(&http).await;
    http.route(COMPLETIONS, 500, "{\"error\":\"model loading\"}\n");
    http.hang_after_body(COMPLETIONS);

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let mut stream = provider.chat_completion_stream(request(), Some(token));
    let err = stream
        .next()
        .await
        .expect("terminal item")
        .expect_err("cancelled");
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(stream.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn stalled_error_body_times_out() {
    let http = Arc::new(MockTransport::new());
    http.route("http://qwen/v1/models", 200, &local_models(&[("qwen2.5:7b", 32_768)]));
    http.route(COMPLETIONS, 503, "{\"error\":\"busy\"}\n");
    http.hang_after_body(COMPLETIONS);
    let mut config = ProviderConfig::new("qwen", ProviderKind::Local, "http://qwen");
    config.timeout_ms = Some(100);
    let provider = ProviderRegistry::new(http.clone())
        .create(&config)
        .expect("provider");
    provider.initialize().await.expect("initialize");

    let items: Vec<_> = provider.chat_completion_stream(request(), None).collect().await;
    assert_eq!(items.len(), 1);
    let err = items[0].as_ref().expect_err("timed out");
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(err.timeout_ms(), Some(100));
}

#[tokio::test]
async fn chat_completion_maps_tool_calls() {
    let http = Arc::new(MockTransport::new());
    let provider = ready_provider(&http).await;
    http.route(
        COMPLETIONS,
        200,
        r#"{"id":"c","model":"qwen2.5:7b","choices":[{"message":{"role":"assistant","content":null,
            "tool_calls":[{"id":"call_1","type":"function","function":{"name":"read_file","arguments":"{\"path\":\"src/lib.rs\"}"}}]},
            "finish_reason":"tool_calls"}]}"#,
    );

    let response = provider
        .chat_completion(request(), None)
        .await
        .expect("response");
    assert_eq!(response.finish_reason, FinishReason::ToolCalls);
    let call = &response.message.tool_calls[0];
    assert_eq!(call.name, "read_file");
    assert_eq!(call.arguments["path"], "src/lib.rs");
}
