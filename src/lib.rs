//! # video-downloader
//!
//! Download videos from YouTube, Instagram, Facebook and Telegram by
//! driving an external extraction engine (`yt-dlp`).
//!
//! ## Features
//!
//! - Host-based platform detection
//! - Best combined video and audio, with automatic quality fallback
//! - Conflict-free, filesystem-safe output names
//! - Progress over a watch channel, cooperative cancellation
//! - Persistent download-directory preference
//!
//! ## Example
//!
//! ```rust,no_run
//! use video_downloader::core::progress_channel;
//! use video_downloader::engine::YtDlpEngine;
//! use video_downloader::Downloader;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = Downloader::new(YtDlpEngine::locate(None)?);
//!     let (progress, _samples) = progress_channel();
//!
//!     let outcome = downloader
//!         .download("https://youtu.be/dQw4w9WgXcQ", Path::new("./downloads"), progress)
//!         .await?;
//!     println!("Downloaded: {}", outcome.path.display());
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod logging;
pub mod platform;
pub mod utils;

// Re-export main types
pub use crate::config::{Config, ConfigStore};
pub use crate::core::{Downloader, Outcome, ProgressSample, VideoInfo};
pub use crate::engine::{FormatPreference, MediaEngine, YtDlpEngine};
pub use crate::error::{ErrorKind, VdlError};
pub use crate::platform::{classify, is_supported, Platform};

/// Result type alias for video-downloader operations
pub type Result<T> = std::result::Result<T, VdlError>;
