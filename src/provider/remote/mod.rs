//! Hosted multi-vendor router speaking an OpenAI-compatible `/api/v1` API.

mod error;
mod models;
mod provider;
mod request;
mod response;
mod types;

pub use provider::RemoteAdapter;
