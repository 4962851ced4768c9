//! Assistant text extraction from decoded response bodies.

use serde_json::Value;

use crate::endpoint::CallMode;

/// Chat-completion shape: `choices[0].message.content`, which some gateways
/// return as a string and others as a list of text parts.
fn chat_text(data: &Value) -> Option<String> {
    let content = data.pointer("/choices/0/message/content")?;
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect();
            if texts.is_empty() {
                None
            } else {
                Some(texts.join("\n").trim().to_string())
            }
        }
        _ => None,
    }
}

/// Gemini native shape: `candidates[0].content.parts[*].text` concatenated.
fn native_text(data: &Value) -> Option<String> {
    let parts = data.pointer("/candidates/0/content/parts")?.as_array()?;
    let texts: Vec<&str> = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n").trim().to_string())
    }
}

/// Pull the assistant's text out of the decoded body for the mode's shape.
/// Returns `None` when no non-empty text can be located.
pub(crate) fn extract_text(mode: CallMode, data: &Value) -> Option<String> {
    let text = match mode {
        CallMode::OpenAiCompatible | CallMode::GeminiOpenAiCompatible => chat_text(data),
        CallMode::GeminiNative => native_text(data),
    }?;
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
