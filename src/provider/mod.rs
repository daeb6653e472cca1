//! Provider contract, shared lifecycle, and the closed set of backend adapters.

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::{StreamExt, stream};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::config::ProviderConfig;
use crate::error::GatewayError;
use crate::types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ModelInfo, ProviderHealth,
};

pub mod local;
mod openai_compat;
pub mod remote;

pub use local::LocalAdapter;
pub use remote::RemoteAdapter;

/// Lazy, finite sequence of streamed chunks.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk, GatewayError>> + Send>>;

/// Contract every backend satisfies, whichever adapter sits behind it.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Name of the config this provider was built from.
    fn name(&self) -> &str;

    fn config(&self) -> &ProviderConfig;

    /// `true` iff initialization succeeded, the config is enabled, and the provider
    /// has not been disposed.
    fn is_available(&self) -> bool;

    async fn get_models(&self) -> Result<Vec<ModelInfo>, GatewayError>;

    /// Probes the backend. Never fails; problems are reported as `healthy: false`.
    async fn check_health(&self) -> ProviderHealth;

    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
        token: Option<CancellationToken>,
    ) -> Result<ChatCompletionResponse, GatewayError>;

    /// Streams a completion. Ends on `[DONE]`, on a terminal error, or on cancellation.
    fn chat_completion_stream(
        &self,
        request: ChatCompletionRequest,
        token: Option<CancellationToken>,
    ) -> ChatStream;

    /// Releases backend resources. Terminal.
    async fn dispose(&self);
}

/// Thread-safe provider handle.
pub type DynProvider = Arc<dyn LlmProvider>;

/// Lifecycle of a [`Provider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Uninitialized,
    Initializing,
    Available,
    Unavailable,
    Disposed,
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProviderState::Uninitialized => "uninitialized",
            ProviderState::Initializing => "initializing",
            ProviderState::Available => "available",
            ProviderState::Unavailable => "unavailable",
            ProviderState::Disposed => "disposed",
        };
        f.write_str(label)
    }
}

/// Backend-specific behavior, one variant per supported backend.
#[derive(Clone)]
pub enum Adapter {
    Local(LocalAdapter),
    Remote(RemoteAdapter),
}

impl Adapter {
    async fn do_initialize(&self) -> Result<(), GatewayError> {
        match self {
            Adapter::Local(adapter) => adapter.do_initialize().await,
            Adapter::Remote(adapter) => adapter.do_initialize().await,
        }
    }

    async fn do_health_check(&self) -> Result<(), GatewayError> {
        match self {
            Adapter::Local(adapter) => adapter.do_health_check().await,
            Adapter::Remote(adapter) => adapter.do_health_check().await,
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        match self {
            Adapter::Local(adapter) => adapter.list_models().await,
            Adapter::Remote(adapter) => adapter.list_models().await,
        }
    }

    async fn chat(
        &self,
        request: &ChatCompletionRequest,
        token: Option<&CancellationToken>,
    ) -> Result<ChatCompletionResponse, GatewayError> {
        match self {
            Adapter::Local(adapter) => adapter.chat(request, token).await,
            Adapter::Remote(adapter) => adapter.chat(request, token).await,
        }
    }

    async fn open_stream(
        &self,
        request: &ChatCompletionRequest,
        token: Option<CancellationToken>,
    ) -> Result<ChatStream, GatewayError> {
        match self {
            Adapter::Local(adapter) => adapter.open_stream(request, token).await,
            Adapter::Remote(adapter) => adapter.open_stream(request, token).await,
        }
    }

    async fn do_dispose(&self) -> Result<(), GatewayError> {
        match self {
            Adapter::Local(adapter) => adapter.do_dispose().await,
            Adapter::Remote(adapter) => adapter.do_dispose().await,
        }
    }
}

/// A configured backend with its lifecycle state.
///
/// Built by the registry; initialized and disposed by the manager.
pub struct Provider {
    config: Arc<ProviderConfig>,
    adapter: Adapter,
    state: Mutex<ProviderState>,
}

impl Provider {
    pub fn new(config: Arc<ProviderConfig>, adapter: Adapter) -> Self {
        Self {
            config,
            adapter,
            state: Mutex::new(ProviderState::Uninitialized),
        }
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    pub fn state(&self) -> ProviderState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, next: ProviderState) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        debug!(provider = %self.config.name, from = %*state, to = %next, "provider state change");
        *state = next;
    }

    /// Runs the backend's initialization probe.
    ///
    /// On failure the provider ends `unavailable` and the cause is returned.
    /// Calling it again on an available provider is a no-op.
    pub async fn initialize(&self) -> Result<(), GatewayError> {
        match self.state() {
            ProviderState::Available => return Ok(()),
            ProviderState::Disposed => return Err(self.disposed_error()),
            _ => {}
        }
        self.set_state(ProviderState::Initializing);
        match self.adapter.do_initialize().await {
            Ok(()) => {
                self.set_state(ProviderState::Available);
                info!(provider = %self.config.name, "provider initialized");
                Ok(())
            }
            Err(err) => {
                self.set_state(ProviderState::Unavailable);
                warn!(provider = %self.config.name, error = %err, "provider initialization failed");
                Err(err)
            }
        }
    }

    fn ensure_available(&self) -> Result<(), GatewayError> {
        let state = self.state();
        if state == ProviderState::Disposed {
            return Err(self.disposed_error());
        }
        if !self.config.enabled {
            return Err(GatewayError::unavailable(format!(
                "provider {} is disabled",
                self.config.name
            )));
        }
        if state != ProviderState::Available {
            return Err(GatewayError::unavailable(format!(
                "provider {} is {state}",
                self.config.name
            )));
        }
        Ok(())
    }

    fn disposed_error(&self) -> GatewayError {
        GatewayError::unavailable(format!("provider {} has been disposed", self.config.name))
    }
}

#[async_trait]
impl LlmProvider for Provider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn is_available(&self) -> bool {
        self.config.enabled && self.state() == ProviderState::Available
    }

    async fn get_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        if self.state() == ProviderState::Disposed {
            return Err(self.disposed_error());
        }
        self.adapter.list_models().await
    }

    async fn check_health(&self) -> ProviderHealth {
        if self.state() == ProviderState::Disposed {
            return ProviderHealth::unhealthy(None, self.disposed_error().to_string());
        }
        let started = Instant::now();
        let outcome = self.adapter.do_health_check().await;
        let latency_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(()) => ProviderHealth::healthy(latency_ms),
            Err(err) => ProviderHealth::unhealthy(Some(latency_ms), err.to_string()),
        }
    }

    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
        token: Option<CancellationToken>,
    ) -> Result<ChatCompletionResponse, GatewayError> {
        self.ensure_available()?;
        self.adapter.chat(&request, token.as_ref()).await
    }

    fn chat_completion_stream(
        &self,
        request: ChatCompletionRequest,
        token: Option<CancellationToken>,
    ) -> ChatStream {
        if let Err(err) = self.ensure_available() {
            return Box::pin(stream::iter([Err::<ChatCompletionChunk, _>(err)]));
        }
        let adapter = self.adapter.clone();
        let opened = stream::once(async move { adapter.open_stream(&request, token).await });
        Box::pin(opened.flat_map(|outcome| match outcome {
            Ok(chunks) => chunks,
            Err(err) => Box::pin(stream::iter([Err::<ChatCompletionChunk, _>(err)])) as ChatStream,
        }))
    }

    async fn dispose(&self) {
        if self.state() == ProviderState::Disposed {
            return;
        }
        if let Err(err) = self.adapter.do_dispose().await {
            warn!(provider = %self.config.name, error = %err, "provider cleanup failed");
        }
        self.set_state(ProviderState::Disposed);
    }
}

/// Resolves the model for `request`, falling back to the first configured model.
pub(crate) fn resolve_model(
    request: &ChatCompletionRequest,
    config: &ProviderConfig,
) -> Result<String, GatewayError> {
    if !request.model.trim().is_empty() {
        return Ok(request.model.clone());
    }
    config.models.first().cloned().ok_or_else(|| {
        GatewayError::validation(format!(
            "model is required for provider {} and none is configured",
            config.name
        ))
    })
}
