//! Canonical data structures shared by every provider.
//!
//! Adapters translate backend payloads to and from these types exclusively, so the
//! rest of the crate never sees a backend-specific shape.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    /// Parses a wire role, treating unknown values as `assistant`.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "system" | "developer" => Role::System,
            "user" => Role::User,
            "tool" => Role::Tool,
            _ => Role::Assistant,
        }
    }
}

/// Normalized chat message.
///
/// # Examples
///
/// ```
/// use llm_gateway::types::{ChatMessage, Role};
///
/// let msg = ChatMessage::user("Summarize this file");
/// assert_eq!(msg.role, Role::User);
/// assert!(msg.tool_calls.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    /// Text content. Assistant messages that only carry tool calls use an empty string.
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool invocations requested by the assistant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Identifier of the call a `tool` message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Builds the `tool` message answering `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut message = Self::with_role(Role::Tool, content);
        message.tool_call_id = Some(tool_call_id.into());
        message
    }
}

/// Function exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema describing the arguments.
    #[serde(default)]
    pub parameters: Value,
}

/// Completed tool invocation with parsed arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments; an empty object when the model emitted unparseable text.
    pub arguments: Value,
}

/// How the model is allowed to pick tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Function { name: String },
}

/// Provider-agnostic chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: Vec::new(),
            tools: Vec::new(),
            tool_choice: None,
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

/// Token accounting reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Complete, non-streaming answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub model: String,
    #[serde(default)]
    pub created: Option<u64>,
    pub message: ChatMessage,
    pub finish_reason: FinishReason,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletionResponse {
    /// Assistant text, convenient for callers that ignore tool calls.
    pub fn text(&self) -> &str {
        &self.message.content
    }
}

/// Incremental fragment of a streamed tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Raw argument text to append to earlier fragments.
    #[serde(default)]
    pub arguments_delta: Option<String>,
}

/// One streamed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub model: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallDelta>,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Advertised model features, also used as requirement thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub streaming: bool,
    pub tools: bool,
    pub images: bool,
    pub code_generation: bool,
    pub max_output_tokens: u32,
    pub context_window_tokens: u32,
}

/// Pricing expressed per thousand tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_price_per_k_tokens: f64,
    pub output_price_per_k_tokens: f64,
    pub currency: String,
}

/// Model metadata exposed by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    /// Name of the provider config that lists this model.
    pub provider: String,
    pub capabilities: ModelCapabilities,
    #[serde(default)]
    pub pricing: Option<ModelPricing>,
    pub is_local: bool,
}

/// Partial set of thresholds a selected provider's models must meet.
///
/// Boolean requirements only constrain when set to `true`; numeric requirements need
/// the model's value to be at least the requested one.
///
/// # Examples
///
/// ```
/// use llm_gateway::types::{CapabilityRequirements, ModelCapabilities};
///
/// let model = ModelCapabilities {
///     streaming: true,
///     tools: true,
///     context_window_tokens: 16_000,
///     ..Default::default()
/// };
/// let needs_32k = CapabilityRequirements {
///     context_window_tokens: Some(32_000),
///     ..Default::default()
/// };
/// assert!(!needs_32k.is_satisfied_by(&model));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRequirements {
    #[serde(default)]
    pub streaming: Option<bool>,
    #[serde(default)]
    pub tools: Option<bool>,
    #[serde(default)]
    pub images: Option<bool>,
    #[serde(default)]
    pub code_generation: Option<bool>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub context_window_tokens: Option<u32>,
}

impl CapabilityRequirements {
    pub fn is_satisfied_by(&self, caps: &ModelCapabilities) -> bool {
        fn flag(required: Option<bool>, actual: bool) -> bool {
            required != Some(true) || actual
        }
        fn at_least(required: Option<u32>, actual: u32) -> bool {
            required.is_none_or(|min| actual >= min)
        }

        flag(self.streaming, caps.streaming)
            && flag(self.tools, caps.tools)
            && flag(self.images, caps.images)
            && flag(self.code_generation, caps.code_generation)
            && at_least(self.max_output_tokens, caps.max_output_tokens)
            && at_least(self.context_window_tokens, caps.context_window_tokens)
    }
}

/// Result of one health probe. Recomputed on every check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub healthy: bool,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    pub checked_at: SystemTime,
}

impl ProviderHealth {
    pub fn healthy(latency_ms: u64) -> Self {
        Self {
            healthy: true,
            latency_ms: Some(latency_ms),
            error: None,
            checked_at: SystemTime::now(),
        }
    }

    pub fn unhealthy(latency_ms: Option<u64>, error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            latency_ms,
            error: Some(error.into()),
            checked_at: SystemTime::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(context_window_tokens: u32) -> ModelCapabilities {
        ModelCapabilities {
            streaming: true,
            tools: false,
            images: false,
            code_generation: true,
            max_output_tokens: 4_096,
            context_window_tokens,
        }
    }

    #[test]
    fn numeric_requirements_are_lower_bounds() {
        let model = caps(16_000);
        let strict = CapabilityRequirements {
            context_window_tokens: Some(32_000),
            ..Default::default()
        };
        let loose = CapabilityRequirements {
            context_window_tokens: Some(8_000),
            ..Default::default()
        };
        assert!(!strict.is_satisfied_by(&model));
        assert!(loose.is_satisfied_by(&model));
    }

    #[test]
    fn boolean_requirements_only_bind_when_true() {
        let model = caps(8_000);
        let wants_tools = CapabilityRequirements {
            tools: Some(true),
            ..Default::default()
        };
        let tools_false = CapabilityRequirements {
            tools: Some(false),
            code_generation: Some(true),
            ..Default::default()
        };
        assert!(!wants_tools.is_satisfied_by(&model));
        assert!(tools_false.is_satisfied_by(&model));
        assert!(CapabilityRequirements::default().is_satisfied_by(&model));
    }

    #[test]
    fn role_from_wire_defaults_to_assistant() {
        assert_eq!(Role::from_wire("developer"), Role::System);
        assert_eq!(Role::from_wire("tool"), Role::Tool);
        assert_eq!(Role::from_wire("narrator"), Role::Assistant);
    }
}
