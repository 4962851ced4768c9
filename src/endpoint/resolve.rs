//! Endpoint resolution for the three supported wire dialects.
//!
//! Every derivation is idempotent with respect to protocol path segments
//! already present on the base URL: resolving against a base that already
//! carries `/v1beta` or `/v1beta/openai` never duplicates them. The base URL
//! itself is operator-supplied and is never rewritten, only extended.

use crate::endpoint::url::{has_segment, has_segment_pair, join_url};
use crate::{Error, ErrorContext, Result};

/// Wire-protocol dialect the client targets. Selected once per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallMode {
    /// OpenAI-style REST: `{base}/chat/completions`, bearer auth.
    OpenAiCompatible,
    /// Gemini native REST: `{base}/v1beta/models/{model}:generateContent`,
    /// `x-goog-api-key` auth.
    GeminiNative,
    /// Gemini's OpenAI compatibility layer: `{base}/v1beta/openai/...`,
    /// bearer auth, OpenAI body shapes.
    GeminiOpenAiCompatible,
}

impl CallMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallMode::OpenAiCompatible => "openai",
            CallMode::GeminiNative => "gemini_native",
            CallMode::GeminiOpenAiCompatible => "gemini_openai",
        }
    }
}

impl std::fmt::Display for CallMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CallMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "openai" => Ok(CallMode::OpenAiCompatible),
            "gemini_native" => Ok(CallMode::GeminiNative),
            "gemini_openai" => Ok(CallMode::GeminiOpenAiCompatible),
            other => Err(Error::configuration_with_context(
                format!("unknown call mode: {}", other),
                ErrorContext::new()
                    .with_field_path("config.mode")
                    .with_source("endpoint_resolver"),
            )),
        }
    }
}

fn reject_native_openai_base(base: &str) -> Result<()> {
    if has_segment_pair(base, "v1beta", "openai") {
        return Err(Error::configuration_with_context(
            "gemini_native base_url must not contain the /v1beta/openai compatibility path",
            ErrorContext::new()
                .with_field_path("config.base_url")
                .with_details(base.trim().to_string())
                .with_source("endpoint_resolver"),
        ));
    }
    Ok(())
}

/// Derive the compatibility root for Gemini's OpenAI layer.
///
/// Appends only the segments the base is missing: `v1beta/openai`, `openai`,
/// or nothing at all.
fn gemini_openai_root(base: &str) -> Result<String> {
    if has_segment_pair(base, "v1beta", "openai") {
        return Ok(base.trim().to_string());
    }
    if has_segment(base, "v1beta") {
        return join_url(base, &["openai"]);
    }
    join_url(base, &["v1beta/openai"])
}

/// Models-list URL for the mode, used by the startup health probe.
pub fn models_url(mode: CallMode, base: &str) -> Result<String> {
    match mode {
        CallMode::OpenAiCompatible => join_url(base, &["models"]),
        CallMode::GeminiNative => {
            reject_native_openai_base(base)?;
            if has_segment(base, "v1beta") {
                join_url(base, &["models"])
            } else {
                join_url(base, &["v1beta", "models"])
            }
        }
        CallMode::GeminiOpenAiCompatible => join_url(&gemini_openai_root(base)?, &["models"]),
    }
}

/// Completion URL for the mode.
///
/// `GeminiNative` requires a model identifier since the model is part of the
/// URL; the other modes carry it in the request body.
pub fn completion_url(mode: CallMode, base: &str, model: Option<&str>) -> Result<String> {
    match mode {
        CallMode::OpenAiCompatible => join_url(base, &["chat/completions"]),
        CallMode::GeminiNative => {
            reject_native_openai_base(base)?;
            let model = model.map(str::trim).filter(|m| !m.is_empty()).ok_or_else(|| {
                Error::configuration_with_context(
                    "gemini_native mode requires a model identifier",
                    ErrorContext::new()
                        .with_field_path("config.model")
                        .with_source("endpoint_resolver"),
                )
            })?;
            let leaf = format!("models/{}:generateContent", model);
            if has_segment(base, "v1beta") {
                join_url(base, &[&leaf])
            } else {
                join_url(base, &["v1beta", &leaf])
            }
        }
        CallMode::GeminiOpenAiCompatible => {
            join_url(&gemini_openai_root(base)?, &["chat/completions"])
        }
    }
}
