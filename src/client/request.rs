//! Per-mode request assembly.
//!
//! The schema instruction is injected twice on chat-shaped requests: as a
//! system message and appended to the user content, so it survives gateways
//! that drop system messages. Gemini native carries it in the text parts and
//! in `systemInstruction`.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use tracing::warn;

use crate::client::config::ClientConfig;
use crate::endpoint::{completion_url, CallMode};
use crate::Result;

/// A fully assembled HTTP exchange, created per call and discarded after it.
pub(crate) struct ResolvedRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

pub(crate) struct ImageAttachment {
    pub mime: &'static str,
    pub data: String,
}

/// Best-effort MIME guess from the file extension.
fn guess_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        // png, unknown extensions and extension-less files alike.
        _ => "image/png",
    }
}

/// Read and base64-encode local images, skipping any that cannot be read.
pub(crate) fn load_images(paths: &[PathBuf]) -> Vec<ImageAttachment> {
    let mut attachments = Vec::new();
    for path in paths {
        match std::fs::read(path) {
            Ok(bytes) => attachments.push(ImageAttachment {
                mime: guess_mime(path),
                data: BASE64.encode(bytes),
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable image");
            }
        }
    }
    attachments
}

/// The "return ONLY JSON matching this schema" instruction.
pub(crate) fn schema_instruction(schema: &Value) -> String {
    format!(
        "Return ONLY a JSON object matching this schema, with no markdown fences and no prose:\n{}",
        serde_json::to_string(schema).unwrap_or_else(|_| "{}".to_string())
    )
}

/// The single-turn instruction for the repair pass.
pub(crate) fn repair_instruction(schema: &Value, raw_text: &str) -> String {
    format!(
        "Convert the following content into a JSON object matching this schema. \
         Return ONLY the JSON object.\n\nSchema:\n{}\n\nContent:\n{}",
        serde_json::to_string(schema).unwrap_or_else(|_| "{}".to_string()),
        raw_text
    )
}

fn chat_body(
    config: &ClientConfig,
    images: &[ImageAttachment],
    prompt: Option<&str>,
    system_instruction: Option<&str>,
    instruction: &str,
) -> Value {
    let mut messages = Vec::new();
    if let Some(system) = system_instruction {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.push(json!({"role": "system", "content": instruction}));

    let mut content = Vec::new();
    for image in images {
        content.push(json!({
            "type": "image_url",
            "image_url": {"url": format!("data:{};base64,{}", image.mime, image.data)}
        }));
    }
    if let Some(prompt) = prompt {
        content.push(json!({"type": "text", "text": prompt}));
    }
    content.push(json!({"type": "text", "text": instruction}));
    messages.push(json!({"role": "user", "content": content}));

    json!({
        "model": config.model_str().unwrap_or(""),
        "messages": messages,
        "temperature": 0,
        "response_format": {"type": "json_object"}
    })
}

fn native_body(
    images: &[ImageAttachment],
    prompt: Option<&str>,
    system_instruction: Option<&str>,
    instruction: &str,
) -> Value {
    let mut parts = Vec::new();
    for image in images {
        parts.push(json!({"inlineData": {"mimeType": image.mime, "data": image.data}}));
    }
    if let Some(prompt) = prompt {
        parts.push(json!({"text": prompt}));
    }
    parts.push(json!({"text": instruction}));

    let system_text = match system_instruction {
        Some(system) => format!("{}\n\n{}", system, instruction),
        None => instruction.to_string(),
    };

    json!({
        "contents": [{"role": "user", "parts": parts}],
        "generationConfig": {"responseMimeType": "application/json"},
        "systemInstruction": {"parts": [{"text": system_text}]}
    })
}

/// Assemble the mode-specific completion request.
pub(crate) fn build(
    config: &ClientConfig,
    images: &[ImageAttachment],
    prompt: Option<&str>,
    system_instruction: Option<&str>,
    schema: &Value,
) -> Result<ResolvedRequest> {
    let url = completion_url(config.mode, &config.base_url, config.model_str())?;
    let instruction = schema_instruction(schema);
    let body = match config.mode {
        CallMode::OpenAiCompatible | CallMode::GeminiOpenAiCompatible => {
            chat_body(config, images, prompt, system_instruction, &instruction)
        }
        CallMode::GeminiNative => native_body(images, prompt, system_instruction, &instruction),
    };
    Ok(ResolvedRequest {
        url,
        headers: config.auth_headers(),
        body,
    })
}

/// Assemble the repair request: same endpoint, single text turn, no images.
pub(crate) fn build_repair(
    config: &ClientConfig,
    schema: &Value,
    raw_text: &str,
) -> Result<ResolvedRequest> {
    let url = completion_url(config.mode, &config.base_url, config.model_str())?;
    let instruction = repair_instruction(schema, raw_text);
    let body = match config.mode {
        CallMode::OpenAiCompatible | CallMode::GeminiOpenAiCompatible => {
            chat_body(config, &[], Some(&instruction), None, &schema_instruction(schema))
        }
        CallMode::GeminiNative => native_body(&[], Some(&instruction), None, &schema_instruction(schema)),
    };
    Ok(ResolvedRequest {
        url,
        headers: config.auth_headers(),
        body,
    })
}

/// Remove the JSON response-format feature from a request body.
///
/// Returns whether anything was removed; the downgrade retry only makes
/// sense when the first attempt actually carried the feature.
pub(crate) fn strip_json_feature(body: &mut Value) -> bool {
    let Some(map) = body.as_object_mut() else {
        return false;
    };
    if map.remove("response_format").is_some() {
        return true;
    }
    if let Some(config) = map.get_mut("generationConfig").and_then(|c| c.as_object_mut()) {
        if config.remove("responseMimeType").is_some() {
            return true;
        }
    }
    false
}
