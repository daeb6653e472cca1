//! Local inference server speaking the OpenAI-compatible `/v1` API.

mod error;
mod models;
mod provider;
mod request;
mod response;
mod types;

pub use provider::LocalAdapter;
