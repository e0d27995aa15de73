//! Mapping engine failures onto [`VdlError`] categories

use super::EngineError;
use crate::error::VdlError;

const FILESYSTEM_HINTS: &[&str] = &[
    "no space left",
    "errno 28",
    "disk quota exceeded",
    "permission denied",
    "read-only file system",
    "file name too long",
    "unable to open for writing",
    "unable to rename file",
];

const ACCESS_HINTS: &[&str] = &[
    "private video",
    "this video is private",
    "is private",
    "sign in to confirm",
    "login required",
    "members-only",
    "http error 401",
    "http error 403",
    "forbidden",
    "not available in your country",
    "geo restricted",
    "geo-restricted",
    "blocked it in your country",
    "age-restricted",
    "confirm your age",
    "video unavailable",
    "has been removed",
    "been deleted",
    "no longer available",
    "copyright",
    "http error 404",
    "not found",
];

const NETWORK_HINTS: &[&str] = &[
    "timed out",
    "timeout",
    "temporary failure in name resolution",
    "name or service not known",
    "getaddrinfo failed",
    "nodename nor servname",
    "connection refused",
    "connection reset",
    "connection aborted",
    "network is unreachable",
    "unable to download webpage",
    "ssl:",
    "http error 429",
    "http error 500",
    "http error 502",
    "http error 503",
    "http error 504",
];

const EXTRACTION_HINTS: &[&str] = &[
    "unable to extract",
    "nsig extraction failed",
    "no video formats",
    "requested format is not available",
    "unable to parse",
];

/// Convert an engine failure into the crate's error taxonomy
pub fn diagnose(error: &EngineError) -> VdlError {
    match error {
        EngineError::Missing { tool } => VdlError::Extraction(format!(
            "{} is not installed; install it and make sure it is on PATH",
            tool
        )),
        EngineError::Io { tool, source } => match source.kind() {
            std::io::ErrorKind::PermissionDenied => {
                VdlError::Extraction(format!("{} cannot be executed: {}", tool, source))
            }
            _ => VdlError::Extraction(format!("failed to run {}: {}", tool, source)),
        },
        EngineError::Failed { stderr, .. } => classify_stderr(stderr),
        EngineError::Malformed(msg) => VdlError::Extraction(msg.clone()),
        EngineError::Cancelled => VdlError::Cancelled,
    }
}

/// Classify engine error output by the phrases it contains
pub fn classify_stderr(stderr: &str) -> VdlError {
    let lower = stderr.to_lowercase();
    let detail = last_error_line(stderr);
    let has = |hints: &[&str]| hints.iter().any(|hint| lower.contains(hint));

    if lower
        .lines()
        .map(str::trim)
        .any(|line| line.starts_with("error: interrupted by user"))
    {
        return VdlError::Cancelled;
    }

    if lower.contains("ffmpeg")
        && (lower.contains("not found") || lower.contains("not installed"))
    {
        return VdlError::Extraction(
            "FFmpeg is required to merge audio and video; install it and retry".to_string(),
        );
    }

    if has(FILESYSTEM_HINTS) {
        return VdlError::FileSystem(detail);
    }

    if lower.contains("unsupported url") {
        return VdlError::Validation(detail);
    }

    if has(NETWORK_HINTS) {
        return VdlError::Network(detail);
    }

    if has(ACCESS_HINTS) {
        return VdlError::Access(detail);
    }

    if has(EXTRACTION_HINTS) {
        return VdlError::Extraction(detail);
    }

    VdlError::Extraction(detail)
}

/// Last `ERROR:` line of engine output, or a trimmed tail of it
pub fn last_error_line(stderr: &str) -> String {
    let line = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.to_lowercase().starts_with("error"));

    match line {
        Some(line) => line
            .strip_prefix("ERROR:")
            .or_else(|| line.strip_prefix("error:"))
            .unwrap_or(line)
            .trim()
            .to_string(),
        None => {
            let trimmed = stderr.trim();
            if trimmed.is_empty() {
                return "engine failed without output".to_string();
            }
            let tail: String = trimmed.chars().rev().take(300).collect();
            tail.chars().rev().collect()
        }
    }
}
