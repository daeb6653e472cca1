use crate::error::GatewayError;
use crate::provider::openai_compat::request_parts;
use crate::types::ChatCompletionRequest;

use super::types::{RemoteChatRequest, RemoteUsageOptions};

pub(crate) fn build_remote_body(
    request: &ChatCompletionRequest,
    model: &str,
    stream: bool,
) -> Result<RemoteChatRequest, GatewayError> {
    let parts = request_parts(request)?;
    Ok(RemoteChatRequest {
        model: model.to_string(),
        messages: parts.messages,
        temperature: request.temperature,
        top_p: request.top_p,
        max_tokens: request.max_tokens,
        stop: request.stop.clone(),
        tools: parts.tools,
        tool_choice: parts.tool_choice,
        stream,
        usage: stream.then_some(RemoteUsageOptions { include: true }),
    })
}
