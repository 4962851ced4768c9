//! Diagnostic snapshot of the most recent exchange.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Last-exchange snapshot, overwritten on every call. Shared clients get
/// last-writer-wins semantics; callers needing isolation use separate client
/// instances.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResponseSnapshot {
    pub mode: String,
    pub base_url: String,
    pub model: Option<String>,
    pub response_json: Option<Value>,
    pub response_text: Option<String>,
}

/// Write a snapshot to disk as formatted JSON, creating parent directories
/// as needed. Diagnostics must never take a call down with them, so any
/// failure is logged and swallowed.
pub(crate) fn dump_snapshot(snapshot: &ResponseSnapshot, path: &Path) {
    if snapshot.response_json.is_none() && snapshot.response_text.is_none() {
        return;
    }
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(path = %path.display(), error = %e, "failed to create cache directory");
            return;
        }
    }
    let payload = match serde_json::to_string_pretty(snapshot) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "failed to serialize response snapshot");
            return;
        }
    };
    if let Err(e) = std::fs::write(path, payload) {
        warn!(path = %path.display(), error = %e, "failed to cache LLM response");
    }
}
