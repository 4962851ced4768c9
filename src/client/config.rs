//! Immutable client configuration.

use std::time::Duration;

use crate::endpoint::CallMode;
use crate::{Error, ErrorContext, Result};

/// Operator-supplied endpoint configuration, validated once at construction
/// and read-only thereafter. The base URL is used verbatim: the client only
/// derives new URLs from it, never rewrites it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub mode: CallMode,
    pub base_url: String,
    pub api_key: String,
    /// Required for `GeminiNative` (the model is part of the completion URL);
    /// carried in the request body for the other modes.
    pub model: Option<String>,
    /// Applied uniformly to every HTTP call the client makes.
    pub timeout: Duration,
}

impl ClientConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "base_url must not be empty",
                ErrorContext::new()
                    .with_field_path("config.base_url")
                    .with_source("client_config"),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "api_key must not be empty",
                ErrorContext::new()
                    .with_field_path("config.api_key")
                    .with_source("client_config"),
            ));
        }
        Ok(())
    }

    pub(crate) fn model_str(&self) -> Option<&str> {
        self.model.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }

    /// Mode-appropriate auth headers: bearer token for the OpenAI-shaped
    /// dialects, the provider API-key header for Gemini native.
    pub(crate) fn auth_headers(&self) -> Vec<(&'static str, String)> {
        match self.mode {
            CallMode::OpenAiCompatible | CallMode::GeminiOpenAiCompatible => {
                vec![("authorization", format!("Bearer {}", self.api_key))]
            }
            CallMode::GeminiNative => vec![("x-goog-api-key", self.api_key.clone())],
        }
    }
}
