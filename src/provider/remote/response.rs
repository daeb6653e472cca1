use serde_json::Value;

use crate::error::GatewayError;
use crate::provider::openai_compat::{WireCompletion, map_completion, map_delta};
use crate::types::{ChatCompletionChunk, ChatCompletionResponse};

use super::error::describe_error;
use super::types::{RemoteChatResponse, RemoteErrorBody, RemoteStreamChunk};

pub(crate) fn map_response(
    resp: RemoteChatResponse,
    provider: &str,
) -> Result<ChatCompletionResponse, GatewayError> {
    if let Some(error) = resp.error.as_ref() {
        return Err(upstream_error(error, provider));
    }
    map_completion(
        WireCompletion {
            id: resp.id,
            model: resp.model,
            created: resp.created,
            choices: resp.choices,
            usage: resp.usage,
        },
        provider,
    )
}

/// Converts one SSE event. Mid-stream failures are reported in-band by the router.
pub(crate) fn convert_chunk(
    chunk: RemoteStreamChunk,
    provider: &str,
) -> Result<ChatCompletionChunk, GatewayError> {
    if let Some(error) = chunk.error.as_ref() {
        return Err(upstream_error(error, provider));
    }
    Ok(map_delta(chunk.id, chunk.model, chunk.choices, chunk.usage))
}

fn upstream_error(error: &RemoteErrorBody, provider: &str) -> GatewayError {
    let status = error
        .code
        .as_ref()
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok());
    GatewayError::Provider {
        provider: provider.to_string(),
        status,
        message: describe_error(error).unwrap_or_else(|| "upstream provider error".to_string()),
    }
}
