//! Wire shapes and field mappings shared by the OpenAI-compatible adapters.
//!
//! Each adapter keeps its own request and response envelopes; messages, tools,
//! choices, deltas and usage look the same on every backend and live here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::error::GatewayError;
use crate::types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, FinishReason,
    Role, ToolCall, ToolCallDelta, ToolChoice, ToolDefinition, Usage,
};

#[derive(Debug, Serialize, Clone)]
pub(crate) struct WireMessage {
    pub(crate) role: &'static str,
    pub(crate) content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub(crate) struct WireTool {
    #[serde(rename = "type")]
    pub(crate) kind: &'static str,
    pub(crate) function: WireFunctionSpec,
}

#[derive(Debug, Serialize, Clone)]
pub(crate) struct WireFunctionSpec {
    pub(crate) name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    pub(crate) parameters: Value,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub(crate) struct WireToolCall {
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[serde(rename = "type", default)]
    pub(crate) kind: Option<String>,
    pub(crate) function: WireFunctionCall,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub(crate) struct WireFunctionCall {
    #[serde(default)]
    pub(crate) name: String,
    /// JSON text as emitted by the model.
    #[serde(default)]
    pub(crate) arguments: String,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct WireChoice {
    #[serde(default)]
    pub(crate) message: WireResponseMessage,
    #[serde(default)]
    pub(crate) finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub(crate) struct WireResponseMessage {
    #[serde(default)]
    pub(crate) role: Option<String>,
    #[serde(default)]
    pub(crate) content: Option<String>,
    #[serde(default)]
    pub(crate) tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub(crate) struct WireUsage {
    #[serde(default)]
    pub(crate) prompt_tokens: u32,
    #[serde(default)]
    pub(crate) completion_tokens: u32,
    #[serde(default)]
    pub(crate) total_tokens: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct WireStreamChoice {
    #[serde(default)]
    pub(crate) delta: WireDelta,
    #[serde(default)]
    pub(crate) finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub(crate) struct WireDelta {
    #[serde(default)]
    pub(crate) role: Option<String>,
    #[serde(default)]
    pub(crate) content: Option<String>,
    #[serde(default)]
    pub(crate) tool_calls: Vec<WireToolCallDelta>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct WireToolCallDelta {
    #[serde(default)]
    pub(crate) index: Option<usize>,
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[serde(default)]
    pub(crate) function: Option<WireFunctionDelta>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct WireFunctionDelta {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) arguments: Option<String>,
}

/// Canonical request parts that map one-to-one onto the wire.
pub(crate) struct WireRequestParts {
    pub(crate) messages: Vec<WireMessage>,
    pub(crate) tools: Vec<WireTool>,
    pub(crate) tool_choice: Option<Value>,
}

pub(crate) fn request_parts(request: &ChatCompletionRequest) -> Result<WireRequestParts, GatewayError> {
    if request.messages.is_empty() {
        return Err(GatewayError::validation(
            "chat completion requires at least one message",
        ));
    }
    Ok(WireRequestParts {
        messages: request.messages.iter().map(convert_message).collect(),
        tools: request.tools.iter().map(convert_tool).collect(),
        tool_choice: request.tool_choice.as_ref().map(convert_tool_choice),
    })
}

fn convert_message(message: &ChatMessage) -> WireMessage {
    // assistant turns that only call tools carry a null content
    let content = if message.role == Role::Assistant
        && message.content.is_empty()
        && !message.tool_calls.is_empty()
    {
        None
    } else {
        Some(message.content.clone())
    };
    WireMessage {
        role: message.role.as_str(),
        content,
        name: message.name.clone(),
        tool_calls: message
            .tool_calls
            .iter()
            .map(|call| WireToolCall {
                id: Some(call.id.clone()),
                kind: Some("function".to_string()),
                function: WireFunctionCall {
                    name: call.name.clone(),
                    arguments: call.arguments.to_string(),
                },
            })
            .collect(),
        tool_call_id: message.tool_call_id.clone(),
    }
}

fn convert_tool(tool: &ToolDefinition) -> WireTool {
    let parameters = match &tool.parameters {
        Value::Null => json!({ "type": "object", "properties": {} }),
        other => other.clone(),
    };
    WireTool {
        kind: "function",
        function: WireFunctionSpec {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters,
        },
    }
}

fn convert_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Function { name } => json!({ "type": "function", "function": { "name": name } }),
    }
}

/// Envelope fields of a complete (non-streamed) answer.
pub(crate) struct WireCompletion {
    pub(crate) id: String,
    pub(crate) model: String,
    pub(crate) created: Option<u64>,
    pub(crate) choices: Vec<WireChoice>,
    pub(crate) usage: Option<WireUsage>,
}

/// Maps the first choice of a complete answer.
pub(crate) fn map_completion(
    completion: WireCompletion,
    provider: &str,
) -> Result<ChatCompletionResponse, GatewayError> {
    let Some(choice) = completion.choices.into_iter().next() else {
        return Err(GatewayError::invalid_response(
            provider,
            "response contained no choices",
        ));
    };
    let message = choice.message;
    let tool_calls: Vec<ToolCall> = message
        .tool_calls
        .into_iter()
        .enumerate()
        .map(|(idx, call)| convert_tool_call(call, idx, provider))
        .collect();
    let finish_reason = match choice.finish_reason.as_deref() {
        Some(reason) => convert_finish_reason(reason),
        None if !tool_calls.is_empty() => FinishReason::ToolCalls,
        None => FinishReason::Stop,
    };
    Ok(ChatCompletionResponse {
        id: completion.id,
        model: completion.model,
        created: completion.created,
        message: ChatMessage {
            role: message
                .role
                .as_deref()
                .map(Role::from_wire)
                .unwrap_or(Role::Assistant),
            content: message.content.unwrap_or_default(),
            name: None,
            tool_calls,
            tool_call_id: None,
        },
        finish_reason,
        usage: completion.usage.map(convert_usage),
    })
}

/// Maps the first choice of one streamed event.
pub(crate) fn map_delta(
    id: Option<String>,
    model: Option<String>,
    choices: Vec<WireStreamChoice>,
    usage: Option<WireUsage>,
) -> ChatCompletionChunk {
    let (delta, finish_reason) = match choices.into_iter().next() {
        Some(choice) => (choice.delta, choice.finish_reason),
        None => (WireDelta::default(), None),
    };
    ChatCompletionChunk {
        id: id.unwrap_or_default(),
        model: model.unwrap_or_default(),
        role: delta.role.as_deref().map(Role::from_wire),
        content: delta.content.filter(|text| !text.is_empty()),
        tool_calls: delta
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(position, call)| {
                let (name, arguments_delta) = call
                    .function
                    .map(|f| (f.name, f.arguments))
                    .unwrap_or((None, None));
                ToolCallDelta {
                    index: call.index.unwrap_or(position),
                    id: call.id,
                    name,
                    arguments_delta,
                }
            })
            .collect(),
        finish_reason: finish_reason.as_deref().map(convert_finish_reason),
        usage: usage.map(convert_usage),
    }
}

pub(crate) fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "length" => FinishReason::Length,
        "tool_calls" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

fn convert_usage(usage: WireUsage) -> Usage {
    Usage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: if usage.total_tokens == 0 {
            usage.prompt_tokens.saturating_add(usage.completion_tokens)
        } else {
            usage.total_tokens
        },
    }
}

fn convert_tool_call(call: WireToolCall, idx: usize, provider: &str) -> ToolCall {
    let arguments = parse_arguments(&call.function.arguments, &call.function.name, provider);
    ToolCall {
        id: call.id.unwrap_or_else(|| format!("call_{idx}")),
        name: call.function.name,
        arguments,
    }
}

fn parse_arguments(raw: &str, tool: &str, provider: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!(provider, tool, error = %err, "tool call arguments are not valid JSON, using {{}}");
            Value::Object(Map::new())
        }
    }
}
