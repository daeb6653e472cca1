use crate::error::GatewayError;
use crate::provider::openai_compat::{WireCompletion, map_completion, map_delta};
use crate::types::{ChatCompletionChunk, ChatCompletionResponse};

use super::types::{LocalChatResponse, LocalStreamChunk};

pub(crate) fn map_response(
    resp: LocalChatResponse,
    provider: &str,
) -> Result<ChatCompletionResponse, GatewayError> {
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

pub(crate) fn convert_chunk(chunk: LocalStreamChunk) -> ChatCompletionChunk {
    map_delta(chunk.id, chunk.model, chunk.choices, chunk.usage)
}
