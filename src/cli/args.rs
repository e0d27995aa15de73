//! Command line argument parsing

use crate::engine::FormatPreference;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

const AFTER_HELP: &str = "\
Supported platforms:
  YouTube    youtube.com, youtu.be
  Instagram  instagram.com
  Facebook   facebook.com, fb.watch
  Telegram   t.me, telegram.org

Examples:
  video-downloader https://www.youtube.com/watch?v=dQw4w9WgXcQ
  video-downloader -o ~/Videos https://youtu.be/dQw4w9WgXcQ
  video-downloader --audio-only https://www.instagram.com/reel/Cxyz123/
  video-downloader --info https://fb.watch/abc123/
  video-downloader -o ./clips --save-config https://t.me/channel/42

Files are saved to ~/Downloads/VideoDownloader unless another directory is
configured. Requires yt-dlp; FFmpeg is needed to merge separate video and
audio streams.";

/// Video Downloader - download videos from YouTube, Instagram, Facebook and Telegram
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, after_help = AFTER_HELP)]
pub struct Args {
    /// Video URL
    pub url: String,

    /// Destination directory (defaults to the configured one)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Download the audio track only
    #[arg(short, long)]
    pub audio_only: bool,

    /// Print video information and exit (no download)
    #[arg(long)]
    pub info: bool,

    /// Remember the destination directory for later runs
    #[arg(long)]
    pub save_config: bool,

    /// Configuration file to use instead of ~/.video_downloader/config.json
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path to the yt-dlp executable
    #[arg(long, value_name = "PATH")]
    pub engine: Option<PathBuf>,

    /// Network timeout (e.g., 30s, 1m)
    #[arg(long, value_name = "DURATION", default_value = "30s")]
    pub timeout: humantime::Duration,

    /// Disable progress output
    #[arg(long)]
    pub no_progress: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            url: String::new(),
            output_dir: None,
            audio_only: false,
            info: false,
            save_config: false,
            config: None,
            engine: None,
            timeout: Duration::from_secs(30).into(),
            no_progress: false,
            verbose: false,
            quiet: false,
        }
    }
}

impl Args {
    /// Get network timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        self.timeout.into()
    }

    /// Format preference selected on the command line
    pub fn format_preference(&self) -> FormatPreference {
        if self.audio_only {
            FormatPreference::AudioOnly
        } else {
            FormatPreference::BestVideoAudio
        }
    }

    /// Get output verbosity level
    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Quiet (only errors)
    Quiet,
    /// Normal
    Normal,
    /// Verbose (debug info)
    Verbose,
}

impl VerbosityLevel {
    /// Log filter for the terminal layer
    pub fn stderr_filter(&self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "off",
            VerbosityLevel::Normal => "warn",
            VerbosityLevel::Verbose => "debug",
        }
    }
}
