//! External media-extraction engine
//!
//! Retrieval, stream selection and muxing are delegated to an external
//! engine. [`MediaEngine`] is the seam; [`YtDlpEngine`] drives the
//! `yt-dlp` binary.

pub mod diagnose;
pub mod tools;
pub mod ytdlp;

pub use diagnose::*;
pub use tools::*;
pub use ytdlp::*;

use crate::core::progress::ProgressReporter;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// What kind of media to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatPreference {
    /// Best combined video and audio, falling back through lower tiers
    #[default]
    BestVideoAudio,
    /// Audio track only, converted to mp3 when possible
    AudioOnly,
}

/// A single fetch handed to the engine
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// Validated source URL
    pub url: String,
    /// Destination directory (already exists)
    pub directory: PathBuf,
    /// File stem the engine must write under; every artifact starts with it
    pub staging_stem: String,
    /// Format preference
    pub format: FormatPreference,
}

impl EngineRequest {
    /// Output template handed to the engine (`<dir>/<stem>.%(ext)s`)
    pub fn output_template(&self) -> String {
        self.directory
            .join(format!("{}.%(ext)s", self.staging_stem))
            .to_string_lossy()
            .into_owned()
    }
}

/// What the engine reports after a successful fetch
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineReport {
    /// File the engine produced
    pub filepath: PathBuf,
    /// Video title
    pub title: Option<String>,
    /// Duration in seconds
    pub duration: Option<f64>,
    /// Size reported by the engine (may be approximate)
    pub filesize: Option<u64>,
}

/// Metadata returned by a probe
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineMetadata {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub duration: f64,
    pub thumbnail: Option<String>,
    pub heights: Vec<u32>,
}

/// Failure inside the engine. Never shown to the user as-is; see [`diagnose`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{tool} is not installed or not on PATH")]
    Missing { tool: String },

    #[error("failed to run {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with status {status:?}: {stderr}")]
    Failed {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("unexpected engine output: {0}")]
    Malformed(String),

    #[error("cancelled")]
    Cancelled,
}

/// Media-extraction backend
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &'static str;

    /// Fetch metadata without downloading
    async fn probe(&self, url: &str) -> Result<EngineMetadata, EngineError>;

    /// Download `request.url` into `request.directory`
    ///
    /// Progress goes through `progress` at whatever granularity the engine
    /// provides. Implementations stop as soon as `cancel` fires and return
    /// [`EngineError::Cancelled`].
    async fn fetch(
        &self,
        request: &EngineRequest,
        progress: &mut ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<EngineReport, EngineError>;
}
