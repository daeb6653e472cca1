//! Owns the live providers and picks one per request.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures_util::future::join_all;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{GatewayConfig, ProviderConfig};
use crate::error::GatewayError;
use crate::provider::{LlmProvider, Provider};
use crate::registry::ProviderRegistry;
use crate::types::{CapabilityRequirements, ModelInfo, ProviderHealth};

/// How [`ProviderManager::get_best_provider`] chooses among candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    /// Lowest `priority` value; configuration order breaks ties.
    #[default]
    FirstAvailable,
    /// Lowest measured health-probe latency.
    Fastest,
    /// Lowest average per-1K price over the provider's models.
    Cheapest,
    /// Highest summed capability score over the provider's models.
    MostCapable,
    Random,
}

impl SelectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStrategy::FirstAvailable => "first-available",
            SelectionStrategy::Fastest => "fastest",
            SelectionStrategy::Cheapest => "cheapest",
            SelectionStrategy::MostCapable => "most-capable",
            SelectionStrategy::Random => "random",
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionStrategy {
    type Err = GatewayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "first-available" => Ok(SelectionStrategy::FirstAvailable),
            "fastest" => Ok(SelectionStrategy::Fastest),
            "cheapest" => Ok(SelectionStrategy::Cheapest),
            "most-capable" => Ok(SelectionStrategy::MostCapable),
            "random" => Ok(SelectionStrategy::Random),
            other => Err(GatewayError::validation(format!(
                "unknown selection strategy: {other}"
            ))),
        }
    }
}

/// Builds providers from configs, initializes them best-effort, and routes requests.
///
/// `initialize` and `dispose` take `&mut self`; everything else can run concurrently.
pub struct ProviderManager {
    registry: ProviderRegistry,
    configs: Vec<ProviderConfig>,
    providers: Vec<Arc<Provider>>,
    default_strategy: SelectionStrategy,
    initialized: bool,
}

impl ProviderManager {
    pub fn new(configs: Vec<ProviderConfig>, registry: ProviderRegistry) -> Self {
        Self {
            registry,
            configs,
            providers: Vec::new(),
            default_strategy: SelectionStrategy::default(),
            initialized: false,
        }
    }

    pub fn from_config(config: GatewayConfig, registry: ProviderRegistry) -> Self {
        Self::new(config.providers, registry).with_default_strategy(config.default_strategy)
    }

    pub fn with_default_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn default_strategy(&self) -> SelectionStrategy {
        self.default_strategy
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Live providers in configuration order.
    pub fn providers(&self) -> &[Arc<Provider>] {
        &self.providers
    }

    pub fn get_provider(&self, name: &str) -> Option<Arc<Provider>> {
        self.providers
            .iter()
            .find(|provider| provider.name() == name)
            .cloned()
    }

    /// Builds and initializes every enabled provider, in order.
    ///
    /// Succeeds when at least one provider is available. Otherwise the error lists
    /// every individual failure. Calling it again after success is a no-op.
    pub async fn initialize(&mut self) -> Result<(), GatewayError> {
        if self.initialized {
            return Ok(());
        }

        let mut failures: Vec<String> = Vec::new();
        let mut providers: Vec<Arc<Provider>> = Vec::new();

        for config in &self.configs {
            if !config.enabled {
                debug!(provider = %config.name, "skipping disabled provider");
                continue;
            }
            if providers.iter().any(|existing| existing.name() == config.name) {
                failures.push(format!("{}: duplicate provider name", config.name));
                continue;
            }
            let provider = match self.registry.create(config) {
                Ok(provider) => provider,
                Err(err) => {
                    warn!(provider = %config.name, error = %err, "failed to construct provider");
                    failures.push(format!("{}: {err}", config.name));
                    continue;
                }
            };
            match bring_up(&provider).await {
                Ok(()) => providers.push(Arc::new(provider)),
                Err(err) => failures.push(format!("{}: {err}", config.name)),
            }
        }

        if providers.is_empty() {
            let detail = if failures.is_empty() {
                "no enabled providers configured".to_string()
            } else {
                failures.join("; ")
            };
            return Err(GatewayError::unavailable(format!(
                "no provider could be initialized: {detail}"
            )));
        }

        if !failures.is_empty() {
            warn!(failed = failures.len(), "some providers failed to initialize: {}", failures.join("; "));
        }
        info!(available = providers.len(), "provider manager initialized");
        self.providers = providers;
        self.initialized = true;
        Ok(())
    }

    /// Picks a provider with `strategy` (or the default) among available providers
    /// that satisfy `requirements`.
    pub async fn get_best_provider(
        &self,
        strategy: Option<SelectionStrategy>,
        requirements: Option<&CapabilityRequirements>,
    ) -> Result<Arc<Provider>, GatewayError> {
        if !self.initialized {
            return Err(GatewayError::unavailable(
                "provider manager is not initialized",
            ));
        }
        let strategy = strategy.unwrap_or(self.default_strategy);

        let mut candidates: Vec<Arc<Provider>> = self
            .providers
            .iter()
            .filter(|provider| provider.is_available())
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Err(GatewayError::not_found("no provider is currently available"));
        }

        if let Some(requirements) = requirements {
            candidates = filter_by_requirements(candidates, requirements).await;
            if candidates.is_empty() {
                return Err(GatewayError::not_found(
                    "no available provider satisfies the capability requirements",
                ));
            }
        }

        let chosen = match strategy {
            SelectionStrategy::FirstAvailable => first_available(&candidates),
            SelectionStrategy::Fastest => fastest(&candidates).await,
            SelectionStrategy::Cheapest => cheapest(&candidates).await,
            SelectionStrategy::MostCapable => most_capable(&candidates).await,
            SelectionStrategy::Random => {
                let mut rng = rand::thread_rng();
                candidates.choose(&mut rng).cloned()
            }
        };
        let chosen = chosen.unwrap_or_else(|| candidates[0].clone());
        debug!(provider = %chosen.name(), %strategy, "selected provider");
        Ok(chosen)
    }

    /// Probes every live provider concurrently. Results follow provider order.
    pub async fn health_check(&self) -> Vec<(String, ProviderHealth)> {
        let probes = self.providers.iter().map(|provider| {
            let provider = provider.clone();
            tokio::spawn(async move { provider.check_health().await })
        });
        let outcomes = join_all(probes).await;
        self.providers
            .iter()
            .zip(outcomes)
            .map(|(provider, outcome)| {
                let health = outcome.unwrap_or_else(|err| {
                    warn!(provider = %provider.name(), error = %err, "health probe aborted");
                    ProviderHealth::unhealthy(None, format!("health check failed: {err}"))
                });
                (provider.name().to_string(), health)
            })
            .collect()
    }

    /// Disposes every provider and resets the manager so it can be initialized again.
    pub async fn dispose(&mut self) {
        let providers = std::mem::take(&mut self.providers);
        join_all(providers.iter().map(|provider| provider.dispose())).await;
        self.initialized = false;
        info!(disposed = providers.len(), "provider manager disposed");
    }
}

/// Initializes `provider`; a provider that fails is disposed before it is dropped.
async fn bring_up(provider: &Provider) -> Result<(), GatewayError> {
    let outcome = provider.initialize().await;
    if outcome.is_err() {
        provider.dispose().await;
    }
    outcome
}

async fn listed_models(candidates: &[Arc<Provider>]) -> Vec<Option<Vec<ModelInfo>>> {
    let listings = join_all(candidates.iter().map(|provider| provider.get_models())).await;
    candidates
        .iter()
        .zip(listings)
        .map(|(provider, listing)| match listing {
            Ok(models) => Some(models),
            Err(err) => {
                warn!(provider = %provider.name(), error = %err, "model listing failed, skipping provider");
                None
            }
        })
        .collect()
}

async fn filter_by_requirements(
    candidates: Vec<Arc<Provider>>,
    requirements: &CapabilityRequirements,
) -> Vec<Arc<Provider>> {
    let listings = listed_models(&candidates).await;
    candidates
        .into_iter()
        .zip(listings)
        .filter_map(|(provider, models)| {
            let satisfied = models?
                .iter()
                .any(|model| requirements.is_satisfied_by(&model.capabilities));
            satisfied.then_some(provider)
        })
        .collect()
}

fn first_available(candidates: &[Arc<Provider>]) -> Option<Arc<Provider>> {
    // min_by_key keeps the first of equal keys
    candidates
        .iter()
        .min_by_key(|provider| provider.config().priority)
        .cloned()
}

async fn fastest(candidates: &[Arc<Provider>]) -> Option<Arc<Provider>> {
    let probes = join_all(candidates.iter().map(|provider| provider.check_health())).await;
    let mut best: Option<(u64, &Arc<Provider>)> = None;
    for (provider, health) in candidates.iter().zip(probes) {
        let Some(latency) = health.latency_ms.filter(|_| health.healthy) else {
            continue;
        };
        if best.is_none_or(|(current, _)| latency < current) {
            best = Some((latency, provider));
        }
    }
    best.map(|(_, provider)| provider.clone())
}

async fn cheapest(candidates: &[Arc<Provider>]) -> Option<Arc<Provider>> {
    let listings = listed_models(candidates).await;
    let mut best: Option<(f64, &Arc<Provider>)> = None;
    for (provider, models) in candidates.iter().zip(listings) {
        let Some(cost) = models.as_deref().and_then(average_cost) else {
            continue;
        };
        if best.is_none_or(|(current, _)| cost < current) {
            best = Some((cost, provider));
        }
    }
    best.map(|(_, provider)| provider.clone())
}

async fn most_capable(candidates: &[Arc<Provider>]) -> Option<Arc<Provider>> {
    let listings = listed_models(candidates).await;
    let mut best: Option<(f64, &Arc<Provider>)> = None;
    for (provider, models) in candidates.iter().zip(listings) {
        let Some(models) = models else {
            continue;
        };
        let score: f64 = models.iter().map(capability_score).sum();
        if best.is_none_or(|(current, _)| score > current) {
            best = Some((score, provider));
        }
    }
    best.map(|(_, provider)| provider.clone())
}

/// Mean of input plus output price per 1K tokens. Unpriced models count as free.
fn average_cost(models: &[ModelInfo]) -> Option<f64> {
    if models.is_empty() {
        return None;
    }
    let total: f64 = models
        .iter()
        .map(|model| {
            model.pricing.as_ref().map_or(0.0, |pricing| {
                pricing.input_price_per_k_tokens + pricing.output_price_per_k_tokens
            })
        })
        .sum();
    Some(total / models.len() as f64)
}

fn capability_score(model: &ModelInfo) -> f64 {
    let caps = &model.capabilities;
    let flags = [caps.tools, caps.images, caps.code_generation, caps.streaming]
        .into_iter()
        .filter(|flag| *flag)
        .count() as f64;
    flags
        + f64::from(caps.context_window_tokens.max(1)).log10()
        + f64::from(caps.max_output_tokens.max(1)).log10()
}
