//! Path-safe URL concatenation.
//!
//! A configured base endpoint may carry a reverse-proxy path prefix and may
//! or may not end in a slash. `join_url` only ever derives new URLs from it;
//! the caller's string is never rewritten.

use url::Url;

use crate::{Error, ErrorContext, Result};

/// Join a base URL with additional path segments.
///
/// Segments are trimmed of leading/trailing slashes and empty segments are
/// skipped, so `join_url(base, &["a", "b"])` and
/// `join_url(base, &["/a/", "b/"])` produce the same URL. Scheme, host,
/// query and fragment of the base are preserved unchanged, as is any path
/// prefix already present on the base.
pub fn join_url(base: &str, segments: &[&str]) -> Result<String> {
    let base = base.trim();
    if base.is_empty() {
        return Err(Error::configuration_with_context(
            "base_url must not be empty",
            ErrorContext::new()
                .with_field_path("config.base_url")
                .with_source("url_joiner"),
        ));
    }

    let mut parsed = Url::parse(base).map_err(|e| {
        Error::configuration_with_context(
            format!("base_url is not a valid absolute URL: {}", e),
            ErrorContext::new()
                .with_field_path("config.base_url")
                .with_details(base.to_string())
                .with_source("url_joiner"),
        )
    })?;

    let mut path = parsed.path().trim_end_matches('/').to_string();
    for segment in segments {
        let cleaned = segment.trim_matches('/');
        if cleaned.is_empty() {
            continue;
        }
        path.push('/');
        path.push_str(cleaned);
    }
    if path.is_empty() {
        path.push('/');
    }

    parsed.set_path(&path);
    Ok(parsed.to_string())
}

/// Split a URL's path into its non-empty segments.
pub(crate) fn path_segments(url: &str) -> Vec<String> {
    Url::parse(url)
        .map(|u| {
            u.path()
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Whether the URL's path contains `segment` as a whole path segment.
///
/// Matches segments, not substrings: a path containing `v1betaX` does not
/// count as containing `v1beta`.
pub fn has_segment(url: &str, segment: &str) -> bool {
    path_segments(url).iter().any(|s| s == segment)
}

/// Whether the URL's path contains `first` immediately followed by `second`.
pub fn has_segment_pair(url: &str, first: &str, second: &str) -> bool {
    let segments = path_segments(url);
    segments
        .windows(2)
        .any(|w| w[0] == first && w[1] == second)
}
