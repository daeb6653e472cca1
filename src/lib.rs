//! Gateway that puts local and remote LLM backends behind one chat-completion contract.
//!
//! A [`ProviderManager`] builds providers from configuration through the
//! [`ProviderRegistry`], initializes them best-effort and picks one per request
//! with a [`SelectionStrategy`]:
//!
//! ```no_run
//! use llm_gateway::config::GatewayConfig;
//! use llm_gateway::{ChatCompletionRequest, ChatMessage, LlmProvider, ProviderManager, ProviderRegistry};
//!
//! # async fn run() -> Result<(), llm_gateway::GatewayError> {
//! let config = GatewayConfig::from_json_str(r#"{
//!     "providers": [
//!         { "name": "qwen", "type": "local", "auth": { "baseUrl": "http://localhost:11434" } }
//!     ]
//! }"#)?;
//! let mut manager = ProviderManager::from_config(config, ProviderRegistry::with_default_transport()?);
//! manager.initialize().await?;
//!
//! let provider = manager.get_best_provider(None, None).await?;
//! let request = ChatCompletionRequest::new("qwen2.5-coder:7b", vec![ChatMessage::user("hello")]);
//! let response = provider.chat_completion(request, None).await?;
//! println!("{}", response.text());
//! manager.dispose().await;
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod http;
pub mod manager;
pub mod provider;
pub mod registry;
pub mod stream;
pub mod transport;
pub mod types;

pub use cancel::CancellationToken;
pub use error::{ErrorKind, GatewayError};
pub use manager::{ProviderManager, SelectionStrategy};
pub use provider::{ChatStream, LlmProvider, Provider, ProviderState};
pub use registry::{AdapterKind, ProviderRegistry};
pub use types::*;
