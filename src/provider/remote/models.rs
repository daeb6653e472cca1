use serde_json::Value;

use crate::types::{ModelCapabilities, ModelInfo, ModelPricing};

use super::types::{RemoteModel, RemotePricing};

pub(crate) const DEFAULT_CONTEXT_WINDOW: u32 = 4_096;
pub(crate) const DEFAULT_MAX_OUTPUT: u32 = 4_096;

const CODE_MODEL_HINTS: [&str; 6] = ["code", "coder", "codestral", "claude", "gpt-4", "deepseek"];

pub(crate) fn convert_model(model: &RemoteModel, provider: &str) -> ModelInfo {
    ModelInfo {
        id: model.id.clone(),
        name: model
            .name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| model.id.clone()),
        provider: provider.to_string(),
        capabilities: capabilities(model),
        pricing: model.pricing.as_ref().and_then(convert_pricing),
        is_local: false,
    }
}

fn capabilities(model: &RemoteModel) -> ModelCapabilities {
    let lower = model.id.to_ascii_lowercase();
    let top = model.top_provider.clone().unwrap_or_default();
    let context_window_tokens = model
        .context_length
        .or(top.context_length)
        .filter(|len| *len > 0)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW);
    let max_output_tokens = top
        .max_completion_tokens
        .filter(|len| *len > 0)
        .unwrap_or_else(|| DEFAULT_MAX_OUTPUT.min(context_window_tokens));

    let tools = match &model.supported_parameters {
        Some(params) => params.iter().any(|param| param == "tools"),
        None => ["gpt-", "claude", "gemini", "mistral", "qwen"]
            .iter()
            .any(|needle| lower.contains(needle)),
    };

    let architecture = model.architecture.clone().unwrap_or_default();
    let images = architecture
        .input_modalities
        .iter()
        .any(|modality| modality == "image")
        || architecture
            .modality
            .as_deref()
            .is_some_and(|modality| {
                modality
                    .split("->")
                    .next()
                    .is_some_and(|inputs| inputs.contains("image"))
            })
        || lower.contains("vision");

    ModelCapabilities {
        streaming: true,
        tools,
        images,
        code_generation: CODE_MODEL_HINTS.iter().any(|needle| lower.contains(needle)),
        max_output_tokens,
        context_window_tokens,
    }
}

/// Per-token USD strings to per-1K-token prices. Negative values mark variable pricing.
fn convert_pricing(pricing: &RemotePricing) -> Option<ModelPricing> {
    let input = per_token(pricing.prompt.as_ref())?;
    let output = per_token(pricing.completion.as_ref())?;
    Some(ModelPricing {
        input_price_per_k_tokens: input * 1000.0,
        output_price_per_k_tokens: output * 1000.0,
        currency: "USD".to_string(),
    })
}

fn per_token(value: Option<&Value>) -> Option<f64> {
    let price = match value? {
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        Value::Number(number) => number.as_f64()?,
        _ => return None,
    };
    (price.is_finite() && price >= 0.0).then_some(price)
}
