use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::StreamExt;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::config::{ProviderConfig, TransportSettings};
use crate::error::GatewayError;
use crate::http::DynHttpTransport;
use crate::provider::{ChatStream, resolve_model};
use crate::transport::{ProviderTransport, ResponseCache, TransportOptions};
use crate::types::{ChatCompletionRequest, ChatCompletionResponse, ModelInfo};

use super::error::extract_remote_error;
use super::models::convert_model;
use super::request::build_remote_body;
use super::response::{convert_chunk, map_response};
use super::types::{RemoteChatResponse, RemoteModelList, RemoteStreamChunk};

const MODELS_CACHE_KEY: &str = "models";

/// Adapter for a hosted router that fans out to many upstream model vendors.
#[derive(Clone)]
pub struct RemoteAdapter {
    config: Arc<ProviderConfig>,
    transport: ProviderTransport,
    prefix: &'static str,
    models: Arc<Mutex<ResponseCache<Vec<ModelInfo>>>>,
}

impl RemoteAdapter {
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
        let prefix = if base_url.ends_with("/api/v1") {
            ""
        } else {
            "/api/v1"
        };
        let models = ResponseCache::new(1, settings.model_cache_ttl);
        let transport = ProviderTransport::new(
            http,
            TransportOptions {
                provider: config.name.clone(),
                base_url,
                auth: config.auth.clone(),
                settings,
                extract_error: extract_remote_error,
            },
        );
        Ok(Self {
            config,
            transport,
            prefix,
            models: Arc::new(Mutex::new(models)),
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

    fn model_cache(&self) -> MutexGuard<'_, ResponseCache<Vec<ModelInfo>>> {
        self.models
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fetching the catalogue doubles as the credential check.
    pub(crate) async fn do_initialize(&self) -> Result<(), GatewayError> {
        let models = self.list_models().await?;
        debug!(provider = %self.config.name, count = models.len(), "router catalogue loaded");
        Ok(())
    }

    pub(crate) async fn do_health_check(&self) -> Result<(), GatewayError> {
        self.transport.probe(&self.models_path(), None).await.map(|_| ())
    }

    /// Catalogue from the router, kept for the model-cache TTL. Failures are surfaced.
    pub(crate) async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        if let Some(models) = self.model_cache().get(MODELS_CACHE_KEY).cloned() {
            return Ok(models);
        }
        let provider = self.config.name.as_str();
        let response = self
            .transport
            .get_json::<RemoteModelList>(&self.models_path(), None)
            .await?;
        let models: Vec<ModelInfo> = response
            .data
            .data
            .iter()
            .map(|model| convert_model(model, provider))
            .collect();
        self.model_cache().insert(MODELS_CACHE_KEY, models.clone());
        Ok(models)
    }

    pub(crate) async fn chat(
        &self,
        request: &ChatCompletionRequest,
        token: Option<&CancellationToken>,
    ) -> Result<ChatCompletionResponse, GatewayError> {
        let model = resolve_model(request, &self.config)?;
        let body = build_remote_body(request, &model, false)?;
        let provider = self.config.name.as_str();
        let response = self
            .transport
            .post_json_with(&self.completions_path(), &body, token, |wire: RemoteChatResponse| {
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
        let body = build_remote_body(request, &model, true)?;
        let events = self
            .transport
            .post_stream::<_, RemoteStreamChunk>(&self.completions_path(), &body, token)
            .await?;
        let provider = self.config.name.clone();
        Ok(Box::pin(events.map(move |event| {
            event.and_then(|chunk| convert_chunk(chunk, &provider))
        })))
    }

    pub(crate) async fn do_dispose(&self) -> Result<(), GatewayError> {
        self.model_cache().clear();
        self.transport.clear_cache();
        Ok(())
    }
}
