//! Builder for creating clients with custom configuration.
//!
//! Keep this surface area small and predictable.

use std::sync::Arc;
use std::time::Duration;

use crate::client::config::ClientConfig;
use crate::client::core::LlmClient;
use crate::endpoint::CallMode;
use crate::structured::shapes::{LabelShape, PathShape, PointListShape, ShapeRecognizer};
use crate::{Error, ErrorContext, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ClientBuilder {
    mode: Option<CallMode>,
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout: Duration,
    recognizers: Vec<Arc<dyn ShapeRecognizer>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            mode: None,
            base_url: None,
            api_key: None,
            model: None,
            timeout: DEFAULT_TIMEOUT,
            recognizers: Vec::new(),
        }
    }

    pub fn mode(mut self, mode: CallMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// The operator-supplied root URL. Used verbatim; only new URLs are ever
    /// derived from it.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Per-HTTP-call timeout, applied uniformly to the primary request, the
    /// downgrade retry and the repair request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a salvage recognizer. Recognizers are consulted in
    /// registration order; the first whose shape matches the schema wins.
    pub fn recognizer(mut self, recognizer: Arc<dyn ShapeRecognizer>) -> Self {
        self.recognizers.push(recognizer);
        self
    }

    /// Register the built-in recognizers with their default field names
    /// (`paths`, `points`, `label`, prompt echo `prompt`).
    pub fn default_shapes(mut self) -> Self {
        self.recognizers.push(Arc::new(PathShape::default()));
        self.recognizers.push(Arc::new(PointListShape::default()));
        self.recognizers.push(Arc::new(LabelShape::default()));
        self
    }

    pub fn build(self) -> Result<LlmClient> {
        let mode = self.mode.ok_or_else(|| {
            Error::configuration_with_context(
                "mode is required",
                ErrorContext::new()
                    .with_field_path("config.mode")
                    .with_source("client_builder"),
            )
        })?;
        let config = ClientConfig {
            mode,
            base_url: self.base_url.unwrap_or_default(),
            api_key: self.api_key.unwrap_or_default(),
            model: self.model,
            timeout: self.timeout,
        };
        LlmClient::new(config, self.recognizers)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
