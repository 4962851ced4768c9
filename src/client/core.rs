//! The completion orchestrator.
//!
//! Each `complete` call is an independent, linear unit of work: assemble the
//! mode-specific request, execute it (with at most one downgrade retry),
//! extract the assistant text, recover a JSON object through the staged
//! pipeline (with at most one repair round trip), normalize it toward the
//! schema and validate. Every failure propagates; there are no other retry
//! loops.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::cache::{dump_snapshot, ResponseSnapshot};
use crate::client::config::ClientConfig;
use crate::client::request::{self, ResolvedRequest};
use crate::client::response::extract_text;
use crate::structured::extract::{extract_json, Extraction, Stage};
use crate::structured::json_schema_from_type;
use crate::structured::shapes::ShapeRecognizer;
use crate::structured::validator::OutputValidator;
use crate::transport::validate::snippet;
use crate::transport::HttpTransport;
use crate::{Error, Result};

/// Characters of offending text carried in extraction failures.
const FAILURE_SNIPPET_CHARS: usize = 500;

/// Per-call inputs for a structured completion.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// Local image files, inlined as base64. Unreadable paths are skipped.
    pub images: Vec<PathBuf>,
    pub prompt: Option<String>,
    pub system_instruction: Option<String>,
}

impl CompletionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.images.push(path.into());
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }
}

/// Multi-backend structured-completion client.
pub struct LlmClient {
    config: ClientConfig,
    transport: HttpTransport,
    recognizers: Vec<Arc<dyn ShapeRecognizer>>,
    last: Mutex<ResponseSnapshot>,
}

impl LlmClient {
    pub fn builder() -> crate::client::builder::ClientBuilder {
        crate::client::builder::ClientBuilder::new()
    }

    pub(crate) fn new(
        config: ClientConfig,
        recognizers: Vec<Arc<dyn ShapeRecognizer>>,
    ) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config.timeout)?;
        let last = Mutex::new(ResponseSnapshot {
            mode: config.mode.to_string(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            ..Default::default()
        });
        Ok(Self {
            config,
            transport,
            recognizers,
            last,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run the startup health probe with this client's configuration.
    pub async fn preflight(&self) -> Result<()> {
        crate::client::preflight::preflight(&self.config).await
    }

    /// Generate a structured result and deserialize it into `T`.
    ///
    /// The JSON schema derived from `T` drives both the "only JSON matching
    /// this schema" instruction and validation of the recovered object.
    pub async fn complete<T>(&self, request: &CompletionRequest) -> Result<T>
    where
        T: DeserializeOwned + schemars::JsonSchema,
    {
        let schema = json_schema_from_type::<T>();
        let value = self.complete_value(request, &schema).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Generate a structured result validated against an explicit schema.
    pub async fn complete_value(
        &self,
        request: &CompletionRequest,
        schema: &Value,
    ) -> Result<Value> {
        let images = request::load_images(&request.images);
        let prompt = request.prompt.as_deref();
        let resolved = request::build(
            &self.config,
            &images,
            prompt,
            request.system_instruction.as_deref(),
            schema,
        )?;

        let data = self.execute_with_downgrade(resolved).await?;
        self.record_json(&data);

        let text = extract_text(self.config.mode, &data).ok_or_else(|| Error::NoTextFound {
            snippet: snippet(&data.to_string(), FAILURE_SNIPPET_CHARS),
        })?;
        self.record_text(&text);

        // On a repair pass the repaired exchange replaces `text`, so the
        // snapshot and the validation-failure salvage below both see the most
        // recent exchange.
        let (text, extraction) = match self.recover(schema, &text) {
            Some(extraction) => (text, extraction),
            None => self.repair(schema, &text).await?,
        };
        debug!(stage = extraction.stage.as_str(), "structured output recovered");

        let candidate = self.normalize(schema, extraction.value, prompt);
        let validator = OutputValidator::new(schema.clone());
        match validator.validate(&candidate) {
            Ok(()) => Ok(candidate),
            Err(errors) => {
                // One last schema-aware salvage from the raw text before
                // surfacing the validation error.
                if let Some(rescued) = self.salvage(schema, &text) {
                    let rescued = self.normalize(schema, rescued.value, prompt);
                    if validator.validate(&rescued).is_ok() {
                        warn!("validation failed on extracted object; salvage candidate accepted");
                        return Ok(rescued);
                    }
                }
                Err(Error::SchemaValidation { errors })
            }
        }
    }

    /// Write the last exchange to disk for diagnosis. Never fails.
    pub fn cache_response(&self, path: &Path) {
        let snapshot = self
            .last
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default();
        dump_snapshot(&snapshot, path);
    }

    fn record_json(&self, data: &Value) {
        if let Ok(mut guard) = self.last.lock() {
            guard.response_json = Some(data.clone());
            guard.response_text = None;
        }
    }

    fn record_text(&self, text: &str) {
        if let Ok(mut guard) = self.last.lock() {
            guard.response_text = Some(text.to_string());
        }
    }

    async fn execute(&self, req: &ResolvedRequest) -> Result<Value> {
        self.transport
            .post_json(&req.url, &req.headers, &req.body, self.config.mode.as_str())
            .await
    }

    /// Execute a completion request; on failure, retry exactly once with the
    /// JSON response-format feature stripped. Some gateways reject the
    /// parameter outright, and this is the only transport-level retry.
    async fn execute_with_downgrade(&self, mut req: ResolvedRequest) -> Result<Value> {
        match self.execute(&req).await {
            Ok(data) => Ok(data),
            Err(first_err) => {
                if request::strip_json_feature(&mut req.body) {
                    warn!(
                        error = %first_err,
                        "completion failed; retrying once without JSON response format"
                    );
                    self.execute(&req).await
                } else {
                    Err(first_err)
                }
            }
        }
    }

    /// Stages 1-4: text pipeline, then registered recognizers.
    fn recover(&self, schema: &Value, text: &str) -> Option<Extraction> {
        extract_json(text).or_else(|| self.salvage(schema, text))
    }

    fn salvage(&self, schema: &Value, text: &str) -> Option<Extraction> {
        for recognizer in &self.recognizers {
            if !recognizer.matches(schema) {
                continue;
            }
            if let Some(value) = recognizer.salvage(schema, text) {
                debug!(recognizer = recognizer.name(), "salvaged structured output");
                return Some(Extraction {
                    value,
                    stage: Stage::Salvage,
                });
            }
        }
        None
    }

    fn normalize(&self, schema: &Value, value: Value, prompt: Option<&str>) -> Value {
        for recognizer in &self.recognizers {
            if recognizer.matches(schema) {
                return recognizer.normalize(schema, value, prompt);
            }
        }
        value
    }

    /// Stage 5: one additional round trip asking the model to convert its own
    /// prior output into strict JSON, then stages 1-4 on the result. The
    /// repair exchange becomes the recorded last exchange, and its text is
    /// returned so later salvage works on it rather than the primary output.
    async fn repair(&self, schema: &Value, raw_text: &str) -> Result<(String, Extraction)> {
        warn!("no JSON recovered from completion text; issuing repair request");
        let resolved = request::build_repair(&self.config, schema, raw_text)?;
        let data = self.execute(&resolved).await?;
        self.record_json(&data);

        let repaired_text =
            extract_text(self.config.mode, &data).ok_or_else(|| Error::UnparsableOutput {
                snippet: snippet(raw_text, FAILURE_SNIPPET_CHARS),
            })?;
        self.record_text(&repaired_text);

        let extraction = self
            .recover(schema, &repaired_text)
            .map(|extraction| Extraction {
                value: extraction.value,
                stage: Stage::Repair,
            })
            .ok_or_else(|| Error::UnparsableOutput {
                snippet: snippet(raw_text, FAILURE_SNIPPET_CHARS),
            })?;
        Ok((repaired_text, extraction))
    }
}
