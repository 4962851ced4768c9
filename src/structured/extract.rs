//! Staged JSON extraction from free-form model text.
//!
//! Models asked for "only JSON" still wrap it in prose, fence it in
//! markdown, or truncate it. Extraction is an ordered table of pure
//! strategies; each stage runs only when every earlier stage produced
//! nothing, and already-clean JSON always resolves at the first stage.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Which pipeline stage produced a value. Kept on the result for
/// diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Full-text JSON parse.
    Direct,
    /// Markdown-fenced block, `json`-tagged or untagged.
    Fenced,
    /// First `{` to last `}` substring. Intentionally loose.
    Bracket,
    /// Schema-aware reconstruction by a registered recognizer.
    Salvage,
    /// Recovered from the output of the remote repair pass.
    Repair,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Direct => "direct",
            Stage::Fenced => "fenced",
            Stage::Bracket => "bracket",
            Stage::Salvage => "salvage",
            Stage::Repair => "repair",
        }
    }
}

/// A recovered JSON value tagged with its producing stage.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub value: Value,
    pub stage: Stage,
}

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)```json\s*([\s\S]*?)```").unwrap());
static FENCED_ANY: Lazy<Regex> = Lazy::new(|| Regex::new(r"```\s*([\s\S]*?)```").unwrap());

fn direct(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        serde_json::from_str(trimmed).ok()
    } else {
        None
    }
}

fn fenced(text: &str) -> Option<Value> {
    for re in [&*FENCED_JSON, &*FENCED_ANY] {
        if let Some(captures) = re.captures(text) {
            let candidate = captures.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            if candidate.is_empty() {
                continue;
            }
            if let Ok(parsed) = serde_json::from_str(candidate) {
                return Some(parsed);
            }
        }
    }
    None
}

fn bracket(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

const STAGES: &[(Stage, fn(&str) -> Option<Value>)] = &[
    (Stage::Direct, direct),
    (Stage::Fenced, fenced),
    (Stage::Bracket, bracket),
];

/// Run the text-only stages (direct, fenced, bracket) in order.
///
/// Schema-aware salvage and the repair pass sit above this function: salvage
/// needs the caller's schema and repair needs a network round trip.
pub fn extract_json(text: &str) -> Option<Extraction> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    for (stage, parse) in STAGES {
        if let Some(value) = parse(text) {
            return Some(Extraction {
                value,
                stage: *stage,
            });
        }
    }
    None
}
