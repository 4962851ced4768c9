//! Client construction, request orchestration and the startup probe.

pub mod builder;
pub mod cache;
pub mod config;
pub mod core;
pub mod preflight;
mod request;
mod response;

pub use builder::ClientBuilder;
pub use cache::ResponseSnapshot;
pub use config::ClientConfig;
pub use core::{CompletionRequest, LlmClient};
pub use preflight::preflight;
