use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::provider::openai_compat::{
    WireChoice, WireMessage, WireStreamChoice, WireTool, WireUsage,
};

#[derive(Debug, Serialize, Clone)]
pub(crate) struct LocalChatRequest {
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
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct LocalChatResponse {
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
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct LocalStreamChunk {
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[serde(default)]
    pub(crate) model: Option<String>,
    #[serde(default)]
    pub(crate) choices: Vec<WireStreamChoice>,
    #[serde(default)]
    pub(crate) usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct LocalModelList {
    #[serde(default)]
    pub(crate) data: Vec<LocalModel>,
}

/// Entry of `/v1/models`. Context metadata is only reported by some servers.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct LocalModel {
    pub(crate) id: String,
    #[serde(default, alias = "max_model_len", alias = "context_window")]
    pub(crate) context_length: Option<u32>,
}
