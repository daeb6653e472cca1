use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::config::{ProviderConfig, TransportSettings};
use crate::error::GatewayError;
use crate::http::DynHttpTransport;
use crate::provider::{ChatStream, resolve_model};
use crate::transport::{ProviderTransport, TransportOptions};
use crate::types::{ChatCompletionRequest, ChatCompletionResponse, ModelInfo};

use super::error::extract_local_error;
use super::models::{convert_model, default_models};
use super::request::build_local_body;
use super::response::{convert_chunk, map_response};
use super::types::{LocalChatResponse, LocalModelList, LocalStreamChunk};

/// Adapter for an OpenAI-compatible local inference server (Qwen via Ollama, vLLM, ...).
#[derive(Clone)]
pub struct LocalAdapter {
    config: Arc<ProviderConfig>,
    transport: ProviderTransport,
    prefix: &'static str,
}

impl LocalAdapter {
    pub fn new(
        config: Arc<ProviderConfig>,
        http: DynHttpTransport,
        settings: TransportSettings,
    ) -> Result<Self, GatewayError> {
        let base_url = config
            .base_url()
            .ok_or_else(|| {
                GatewayError::validation(format!("provider {} has no base URL", config.name))
            })?
            .to_string();
        // accept both `http://host:port` and `http://host:port/v1`
        let prefix = if base_url.ends_with("/v1") { "" } else { "/v1" };
        let transport = ProviderTransport::new(
            http,
            TransportOptions {
                provider: config.name.clone(),
                base_url,
                auth: config.auth.clone(),
                settings,
                extract_error: extract_local_error,
            },
        );
        Ok(Self {
            config,
            transport,
            prefix,
        })
    }

    pub fn transport(&self) -> &ProviderTransport {
        &self.transport
    }

    fn models_path(&self) -> String {
        format!("{}/models", self.prefix)
    }

    fn completions_path(&self) -> String {
        format!("{}/chat/completions", self.prefix)
    }

    pub(crate) async fn do_initialize(&self) -> Result<(), GatewayError> {
        self.probe_server().await
    }

    pub(crate) async fn do_health_check(&self) -> Result<(), GatewayError> {
        self.probe_server().await
    }

    /// A server without a listing endpoint answers 404 there but is still reachable.
    async fn probe_server(&self) -> Result<(), GatewayError> {
        match self.transport.probe(&self.models_path(), None).await {
            Ok(_) => Ok(()),
            Err(GatewayError::Provider {
                status: Some(404), ..
            }) => {
                debug!(provider = %self.config.name, "no model listing endpoint, server reachable");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Lists served models, falling back to a static list when the server has no
    /// listing endpoint or returns nothing.
    pub(crate) async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        let provider = self.config.name.as_str();
        match self
            .transport
            .get_json::<LocalModelList>(&self.models_path(), None)
            .await
        {
            Ok(response) if !response.data.data.is_empty() => Ok(response
                .data
                .data
                .iter()
                .map(|model| convert_model(model, provider))
                .collect()),
            Ok(_) => {
                debug!(provider, "model listing was empty, using defaults");
                Ok(default_models(&self.config.models, provider))
            }
            Err(err) => {
                warn!(provider, error = %err, "model listing failed, using defaults");
                Ok(default_models(&self.config.models, provider))
            }
        }
    }

    pub(crate) async fn chat(
        &self,
        request: &ChatCompletionRequest,
        token: Option<&CancellationToken>,
    ) -> Result<ChatCompletionResponse, GatewayError> {
        let model = resolve_model(request, &self.config)?;
        let body = build_local_body(request, &model, false)?;
        let provider = self.config.name.as_str();
        let response = self
            .transport
            .post_json_with(&self.completions_path(), &body, token, |wire: LocalChatResponse| {
                map_response(wire, provider)
            })
            .await?;
        Ok(response.data)
    }

    pub(crate) async fn open_stream(
        &self,
        request: &ChatCompletionRequest,
        token: Option<CancellationToken>,
    ) -> Result<ChatStream, GatewayError> {
        let model = resolve_model(request, &self.config)?;
        let body = build_local_body(request, &model, true)?;
        let events = self
            .transport
            .post_stream::<_, LocalStreamChunk>(&self.completions_path(), &body, token)
            .await?;
        Ok(Box::pin(events.map(|event| event.map(convert_chunk))))
    }

    pub(crate) async fn do_dispose(&self) -> Result<(), GatewayError> {
        self.transport.clear_cache();
        Ok(())
    }
}
