//! Video metadata and download results

use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata about a video, fetched without downloading it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Video ID on its platform
    pub id: String,
    /// Video title
    pub title: String,
    /// Channel or account that posted the video
    pub uploader: String,
    /// Duration in seconds
    pub duration: f64,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    /// Distinct video heights on offer, highest first (e.g. 1080, 720)
    pub available_heights: Vec<u32>,
    /// Platform the URL was classified as
    pub platform: Platform,
}

impl VideoInfo {
    /// Heights rendered as quality labels ("1080p", "720p", ...)
    pub fn quality_labels(&self) -> Vec<String> {
        self.available_heights
            .iter()
            .map(|h| format!("{}p", h))
            .collect()
    }

    /// Best quality label, if any heights are known
    pub fn best_quality(&self) -> Option<String> {
        self.available_heights.first().map(|h| format!("{}p", h))
    }
}

/// Result of a successful download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Final location of the stored file
    pub path: PathBuf,
    /// Title as reported by the engine
    pub title: String,
    /// Platform the URL was classified as
    pub platform: Platform,
    /// Size of the stored file in bytes
    pub byte_size: u64,
    /// Media duration in seconds (0.0 when unknown)
    pub duration: f64,
}

impl Outcome {
    /// File name of the stored file
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
