//! Maps configuration names to the adapter that can build them.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::config::{AuthScheme, ProviderConfig, TransportSettings};
use crate::error::GatewayError;
use crate::http::DynHttpTransport;
use crate::http::reqwest::default_dyn_transport;
use crate::provider::{Adapter, LocalAdapter, Provider, RemoteAdapter};

/// Factory for one backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// OpenAI-compatible local inference server.
    Local,
    /// Hosted multi-vendor router.
    Remote,
}

impl AdapterKind {
    /// Adapter-specific checks on top of [`ProviderConfig::validate`].
    pub fn validate(&self, config: &ProviderConfig) -> Result<(), GatewayError> {
        config.validate()?;
        if *self == AdapterKind::Remote {
            let has_key = config.auth.scheme == AuthScheme::ApiKey
                && config
                    .auth
                    .api_key
                    .as_deref()
                    .is_some_and(|key| !key.trim().is_empty());
            if !has_key {
                return Err(GatewayError::validation(format!(
                    "invalid configuration for {}: remote providers require an api_key credential",
                    config.name
                )));
            }
        }
        Ok(())
    }

    pub fn create(
        &self,
        config: Arc<ProviderConfig>,
        http: DynHttpTransport,
        settings: TransportSettings,
    ) -> Result<Provider, GatewayError> {
        self.validate(&config)?;
        let adapter = match self {
            AdapterKind::Local => {
                Adapter::Local(LocalAdapter::new(config.clone(), http, settings)?)
            }
            AdapterKind::Remote => {
                Adapter::Remote(RemoteAdapter::new(config.clone(), http, settings)?)
            }
        };
        Ok(Provider::new(config, adapter))
    }
}

/// Resolves provider configs to factories and builds uninitialized providers.
///
/// # Examples
///
/// ```
/// use llm_gateway::registry::{AdapterKind, ProviderRegistry};
///
/// let registry = ProviderRegistry::with_default_transport().unwrap();
/// assert_eq!(registry.resolve("qwen").unwrap(), AdapterKind::Local);
/// assert_eq!(registry.resolve("my-openrouter").unwrap(), AdapterKind::Remote);
/// assert!(registry.resolve("anthropic").is_err());
/// ```
#[derive(Clone)]
pub struct ProviderRegistry {
    factories: HashMap<String, AdapterKind>,
    http: DynHttpTransport,
    settings: TransportSettings,
}

impl ProviderRegistry {
    pub fn new(http: DynHttpTransport) -> Self {
        let factories = HashMap::from([
            ("qwen".to_string(), AdapterKind::Local),
            ("openrouter".to_string(), AdapterKind::Remote),
        ]);
        Self {
            factories,
            http,
            settings: TransportSettings::default(),
        }
    }

    /// Registry backed by a reqwest client.
    pub fn with_default_transport() -> Result<Self, GatewayError> {
        Ok(Self::new(default_dyn_transport()?))
    }

    /// Transport bounds applied to every provider built from now on.
    pub fn with_settings(mut self, settings: TransportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Registers (or replaces) the factory for an exact config name.
    pub fn register(&mut self, name: impl Into<String>, kind: AdapterKind) {
        self.factories.insert(name.into(), kind);
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Exact match first, then a substring heuristic on the name.
    pub fn resolve(&self, name: &str) -> Result<AdapterKind, GatewayError> {
        if let Some(kind) = self.factories.get(name) {
            return Ok(*kind);
        }
        let lower = name.to_ascii_lowercase();
        let kind = if lower.contains("qwen") || lower.contains("local") {
            Some(AdapterKind::Local)
        } else if lower.contains("router") {
            Some(AdapterKind::Remote)
        } else {
            None
        };
        match kind {
            Some(kind) => {
                debug!(name, ?kind, "resolved provider factory by name heuristic");
                Ok(kind)
            }
            None => Err(GatewayError::not_found(format!(
                "no provider factory matches {name:?}"
            ))),
        }
    }

    /// Builds an uninitialized provider for `config`.
    pub fn create(&self, config: &ProviderConfig) -> Result<Provider, GatewayError> {
        let kind = self.resolve(&config.name)?;
        let settings = self.settings.clone().with_config_timeout(config);
        kind.create(Arc::new(config.clone()), self.http.clone(), settings)
    }

    /// Validates an arbitrary configuration object.
    pub fn validate_config(&self, raw: &Value) -> Result<(), GatewayError> {
        let Some(object) = raw.as_object() else {
            return Err(GatewayError::validation(
                "provider configuration must be an object",
            ));
        };
        let name = object
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                GatewayError::validation("provider configuration requires a non-empty name")
            })?;
        let kind = self.resolve(name)?;
        let config: ProviderConfig = serde_json::from_value(raw.clone()).map_err(|err| {
            GatewayError::validation(format!("invalid configuration for {name}: {err}"))
        })?;
        kind.validate(&config)
    }
}
