use crate::types::{ModelCapabilities, ModelInfo};

use super::types::LocalModel;

pub(crate) const DEFAULT_CONTEXT_WINDOW: u32 = 32_768;
pub(crate) const DEFAULT_MAX_OUTPUT: u32 = 8_192;

/// Served when the local server does not expose a listing.
pub(crate) const DEFAULT_MODELS: [&str; 3] = ["qwen2.5-coder:7b", "qwen2.5:7b", "qwen2.5vl:7b"];

pub(crate) fn convert_model(model: &LocalModel, provider: &str) -> ModelInfo {
    model_info(&model.id, model.context_length, provider)
}

pub(crate) fn model_info(id: &str, context_length: Option<u32>, provider: &str) -> ModelInfo {
    ModelInfo {
        id: id.to_string(),
        name: id.to_string(),
        provider: provider.to_string(),
        capabilities: infer_capabilities(id, context_length),
        pricing: None,
        is_local: true,
    }
}

/// Name-based capability inference; local servers rarely advertise features.
pub(crate) fn infer_capabilities(id: &str, context_length: Option<u32>) -> ModelCapabilities {
    let lower = id.to_ascii_lowercase();
    let context_window_tokens = context_length
        .filter(|len| *len > 0)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW);
    ModelCapabilities {
        streaming: true,
        tools: ["qwen", "tool", "hermes", "functionary"]
            .iter()
            .any(|needle| lower.contains(needle)),
        images: ["vl", "vision", "llava"]
            .iter()
            .any(|needle| lower.contains(needle)),
        code_generation: lower.contains("code"),
        max_output_tokens: DEFAULT_MAX_OUTPUT.min(context_window_tokens),
        context_window_tokens,
    }
}

pub(crate) fn default_models(configured: &[String], provider: &str) -> Vec<ModelInfo> {
    if configured.is_empty() {
        DEFAULT_MODELS
            .iter()
            .map(|id| model_info(id, None, provider))
            .collect()
    } else {
        configured
            .iter()
            .map(|id| model_info(id, None, provider))
            .collect()
    }
}
