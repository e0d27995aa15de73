//! URL utilities for validating and normalizing video links

use crate::error::VdlError;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// A scheme at the very start of the string; `://` later on belongs to a query or fragment
static SCHEME_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://").expect("static pattern"));

/// Trim whitespace and add an `https://` scheme when none is present
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || SCHEME_PREFIX.is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    }
}

/// Validate a user-supplied URL
///
/// Accepts links without a scheme (treated as https). Only http and https
/// URLs with a host are valid.
pub fn validate_url(raw: &str) -> Result<Url, VdlError> {
    let normalized = normalize_url(raw);
    if normalized.is_empty() {
        return Err(VdlError::Validation("URL cannot be empty".to_string()));
    }

    let parsed = Url::parse(&normalized)
        .map_err(|e| VdlError::Validation(format!("Invalid URL format: {}", e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(VdlError::Validation(format!(
            "Invalid URL protocol: {}. Only http and https are supported",
            parsed.scheme()
        )));
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(VdlError::Validation(
            "Invalid URL format: missing domain name".to_string(),
        )),
    }
}

/// Lowercase host of a URL-like string, ignoring scheme, path, query and fragment
pub fn host_of(raw: &str) -> Option<String> {
    let normalized = normalize_url(raw);
    if normalized.is_empty() {
        return None;
    }

    let parsed = Url::parse(&normalized).ok()?;
    parsed
        .host_str()
        .map(|host| host.trim_end_matches('.').to_ascii_lowercase())
        .filter(|host| !host.is_empty())
}
