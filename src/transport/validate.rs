//! Defensive inspection of completed HTTP responses.
//!
//! Gateways in front of arbitrary operator-supplied endpoints fail in many
//! shapes: HTML interstitials, empty bodies from a WAF, JSON content-type
//! with malformed bytes, error payloads that are themselves valid JSON. Each
//! shape gets its own check, a diagnostic log line with status, content-type
//! and a bounded body snippet, and a distinct error variant.

use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};

use crate::Result;

/// Maximum characters of body text carried in diagnostics.
const SNIPPET_CHARS: usize = 1000;

/// A response that completed at the HTTP level but failed shape checks.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("empty response body (status={status}, content_type={content_type}, url={url})")]
    EmptyBody {
        status: u16,
        content_type: String,
        url: String,
    },

    #[error("non-JSON response (status={status}, content_type={content_type}, url={url})")]
    NonJson {
        status: u16,
        content_type: String,
        url: String,
        snippet: String,
    },

    #[error("malformed JSON body (status={status}, content_type={content_type}, url={url}): {source}")]
    Decode {
        status: u16,
        content_type: String,
        url: String,
        snippet: String,
        source: serde_json::Error,
    },

    #[error("HTTP error response (status={status}, url={url})")]
    Status {
        status: u16,
        url: String,
        /// The decoded error payload, kept for diagnosis.
        body: Value,
    },
}

/// Truncate text to at most `max` characters.
pub(crate) fn snippet(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Validate a completed response and decode its JSON body.
///
/// Checks run in a fixed order. An error status alone does not fail the call
/// up front; the body is still read so the caller gets the gateway's actual
/// payload in the error. Decoding happens before the final status check for
/// the same reason: error payloads are usually valid JSON worth surfacing.
pub async fn checked_json(resp: reqwest::Response, context: &str) -> Result<Value> {
    let status = resp.status();
    let url = resp.url().to_string();
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    let header_dump = format!("{:?}", resp.headers());

    let body = resp.bytes().await?;

    if status.as_u16() >= 400 {
        warn!(
            context,
            status = status.as_u16(),
            %url,
            "LLM HTTP error status observed"
        );
    }

    if body.is_empty() {
        error!(
            context,
            status = status.as_u16(),
            content_type = %content_type,
            %url,
            "LLM HTTP response body is empty (gateway/WAF interception or upstream failure)"
        );
        return Err(ResponseError::EmptyBody {
            status: status.as_u16(),
            content_type,
            url,
        }
        .into());
    }

    let text = String::from_utf8_lossy(&body);
    let body_snippet = snippet(&text, SNIPPET_CHARS);

    if !content_type.contains("application/json") {
        error!(
            context,
            status = status.as_u16(),
            content_type = %content_type,
            %url,
            body_snippet = %body_snippet,
            "LLM HTTP non-JSON response"
        );
        return Err(ResponseError::NonJson {
            status: status.as_u16(),
            content_type,
            url,
            snippet: body_snippet,
        }
        .into());
    }

    let data: Value = match serde_json::from_slice(&body) {
        Ok(data) => data,
        Err(e) => {
            error!(
                context,
                status = status.as_u16(),
                content_type = %content_type,
                %url,
                headers = %header_dump,
                body_snippet = %body_snippet,
                "LLM HTTP body claims JSON but failed to decode"
            );
            return Err(ResponseError::Decode {
                status: status.as_u16(),
                content_type,
                url,
                snippet: body_snippet,
                source: e,
            }
            .into());
        }
    };

    if status.is_client_error() || status.is_server_error() {
        error!(
            context,
            status = status.as_u16(),
            %url,
            body = %data,
            "LLM HTTP error response"
        );
        return Err(ResponseError::Status {
            status: status.as_u16(),
            url,
            body: data,
        }
        .into());
    }

    Ok(data)
}
