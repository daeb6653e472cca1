use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::provider::openai_compat::{
    WireChoice, WireMessage, WireStreamChoice, WireTool, WireUsage,
};

#[derive(Debug, Serialize, Clone)]
pub(crate) struct RemoteChatRequest {
    pub(crate) model: String,
    pub(crate) messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) stop: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tool_choice: Option<Value>,
    pub(crate) stream: bool,
    /// Asks the router to attach token usage to the final streamed chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) usage: Option<RemoteUsageOptions>,
}

#[derive(Debug, Serialize, Clone, Copy)]
pub(crate) struct RemoteUsageOptions {
    pub(crate) include: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct RemoteChatResponse {
    #[serde(default)]
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) model: String,
    #[serde(default)]
    pub(crate) created: Option<u64>,
    #[serde(default)]
    pub(crate) choices: Vec<WireChoice>,
    #[serde(default)]
    pub(crate) usage: Option<WireUsage>,
    /// Upstream failures can arrive with a 200 status.
    #[serde(default)]
    pub(crate) error: Option<RemoteErrorBody>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct RemoteStreamChunk {
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[serde(default)]
    pub(crate) model: Option<String>,
    #[serde(default)]
    pub(crate) choices: Vec<WireStreamChoice>,
    #[serde(default)]
    pub(crate) usage: Option<WireUsage>,
    #[serde(default)]
    pub(crate) error: Option<RemoteErrorBody>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct RemoteErrorEnvelope {
    pub(crate) error: RemoteErrorBody,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct RemoteErrorBody {
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) code: Option<Value>,
    #[serde(default)]
    pub(crate) metadata: Option<RemoteErrorMetadata>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct RemoteErrorMetadata {
    /// Upstream provider's own error text.
    #[serde(default)]
    pub(crate) raw: Option<Value>,
    #[serde(default)]
    pub(crate) provider_name: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct RemoteModelList {
    #[serde(default)]
    pub(crate) data: Vec<RemoteModel>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct RemoteModel {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) context_length: Option<u32>,
    #[serde(default)]
    pub(crate) architecture: Option<RemoteArchitecture>,
    #[serde(default)]
    pub(crate) pricing: Option<RemotePricing>,
    #[serde(default)]
    pub(crate) top_provider: Option<RemoteTopProvider>,
    /// Absent on older listings.
    #[serde(default)]
    pub(crate) supported_parameters: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub(crate) struct RemoteArchitecture {
    /// Legacy form such as `text+image->text`.
    #[serde(default)]
    pub(crate) modality: Option<String>,
    #[serde(default)]
    pub(crate) input_modalities: Vec<String>,
}

/// USD per token, encoded as decimal strings.
#[derive(Debug, Deserialize, Clone, Default)]
pub(crate) struct RemotePricing {
    #[serde(default)]
    pub(crate) prompt: Option<Value>,
    #[serde(default)]
    pub(crate) completion: Option<Value>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub(crate) struct RemoteTopProvider {
    #[serde(default)]
    pub(crate) context_length: Option<u32>,
    #[serde(default)]
    pub(crate) max_completion_tokens: Option<u32>,
}
