use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::manager::SelectionStrategy;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Ceiling applied to request and response bodies.
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_CACHE_CAPACITY: usize = 100;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_MODEL_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Where a backend runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Local,
    Remote,
}

/// Authentication scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    ApiKey,
    #[serde(rename = "oauth")]
    OAuth,
    #[default]
    None,
}

/// Credentials and addressing for one backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAuth {
    #[serde(default, rename = "type", alias = "scheme")]
    pub scheme: AuthScheme,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Required before any network call.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// One configured backend, as produced by the configuration layer.
///
/// Immutable once handed to a provider. A lower `priority` is preferred.
///
/// # Examples
///
/// ```
/// use llm_gateway::config::ProviderConfig;
///
/// let config: ProviderConfig = serde_json::from_str(r#"{
///     "name": "qwen",
///     "type": "local",
///     "priority": 1,
///     "enabled": true,
///     "auth": { "type": "none", "baseUrl": "http://localhost:11434" },
///     "models": ["qwen2.5-coder:7b"]
/// }"#).unwrap();
/// assert!(config.validate().is_ok());
/// assert_eq!(config.timeout().as_millis(), 30_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub name: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: ProviderKind,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub auth: ProviderAuth,
    #[serde(default)]
    pub models: Vec<String>,
    /// Overrides `auth.base_url` when set.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Carried for callers; the gateway itself never retries.
    #[serde(default, alias = "retries")]
    pub max_retries: Option<u32>,
}

fn default_enabled() -> bool {
    true
}

impl ProviderConfig {
    /// Minimal enabled config pointing at `base_url` with no authentication.
    pub fn new(name: impl Into<String>, kind: ProviderKind, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            priority: 0,
            enabled: true,
            auth: ProviderAuth {
                base_url: Some(base_url.into()),
                ..Default::default()
            },
            models: Vec::new(),
            endpoint: None,
            timeout_ms: None,
            max_retries: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.auth.scheme = AuthScheme::ApiKey;
        self.auth.api_key = Some(api_key.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Resolved base URL without a trailing slash.
    pub fn base_url(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .or(self.auth.base_url.as_deref())
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    /// Generic checks shared by every adapter.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.name.trim().is_empty() {
            return Err(invalid("name", "must not be empty"));
        }
        if self.base_url().is_none() {
            return Err(invalid(&self.name, "auth.baseUrl is required"));
        }
        if self.auth.scheme == AuthScheme::ApiKey
            && self
                .auth
                .api_key
                .as_deref()
                .is_none_or(|key| key.trim().is_empty())
        {
            return Err(invalid(&self.name, "api_key scheme requires auth.apiKey"));
        }
        if self.timeout_ms == Some(0) {
            return Err(invalid(&self.name, "timeoutMs must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> GatewayError {
    GatewayError::validation(format!("invalid configuration for {field}: {reason}"))
}

/// Resource bounds for one provider transport.
///
/// Passed in at construction so tests can shrink them.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSettings {
    pub timeout: Duration,
    pub max_body_bytes: usize,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
    pub model_cache_ttl: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: DEFAULT_CACHE_TTL,
            model_cache_ttl: DEFAULT_MODEL_CACHE_TTL,
        }
    }
}

impl TransportSettings {
    /// Applies the per-provider timeout override from `config`, if any.
    pub fn with_config_timeout(mut self, config: &ProviderConfig) -> Self {
        if config.timeout_ms.is_some() {
            self.timeout = config.timeout();
        }
        self
    }
}

/// Whole gateway configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub default_strategy: SelectionStrategy,
}

impl GatewayConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, GatewayError> {
        serde_json::from_str(raw).map_err(|err| {
            GatewayError::validation(format!("failed to parse gateway configuration: {err}"))
        })
    }
}
