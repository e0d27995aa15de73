//! Output formatting and progress display

use crate::cli::args::VerbosityLevel;
use crate::core::progress::{format_bytes, format_duration, ProgressSample};
use crate::core::video_info::{Outcome, VideoInfo};
use crate::error::VdlError;
use crate::platform::Platform;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Redraws per second; engine samples arriving faster are coalesced
const REDRAW_HZ: u8 = 8;

/// Output formatter for the CLI
pub struct OutputFormatter {
    verbosity: VerbosityLevel,
    progress_bar: Option<ProgressBar>,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            progress_bar: None,
        }
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    /// Create the download progress bar. Length is filled in once known.
    pub fn create_progress_bar(&mut self) -> Option<ProgressBar> {
        if self.verbosity == VerbosityLevel::Quiet {
            return None;
        }

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {bytes}/{total_bytes} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");

        let progress_bar =
            ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(REDRAW_HZ));
        progress_bar.set_style(style);
        progress_bar.set_message("Starting...");
        progress_bar.enable_steady_tick(Duration::from_millis(250));

        self.progress_bar = Some(progress_bar.clone());
        Some(progress_bar)
    }

    /// Update progress bar from the latest sample
    pub fn update_progress(&self, sample: &ProgressSample) {
        if let Some(progress_bar) = &self.progress_bar {
            if let Some(total) = sample.total_bytes {
                progress_bar.set_length(total);
            }
            progress_bar.set_position(sample.downloaded_bytes);
            progress_bar.set_message(progress_message(sample));
        }
    }

    /// Finish progress bar
    pub fn finish_progress(&self, message: &str) {
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.finish_with_message(message.to_string());
        }
    }

    /// Remove the progress bar without a final message
    pub fn clear_progress(&self) {
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.finish_and_clear();
        }
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            println!("{} {}", "ℹ".blue(), message);
        }
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            println!("{} {}", "✔".green().bold(), message);
        }
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("{} {}", "⚠".yellow().bold(), message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✘".red().bold(), message);
    }

    /// Print detected platform and destination
    pub fn print_download_start(&self, platform: Platform, directory: &Path) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }

        println!("Platform: {}", platform.display_name().bold());
        println!("Saving to: {}", directory.display());
        println!();
    }

    /// Print video information
    pub fn print_video_info(&self, info: &VideoInfo) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }

        for line in video_info_lines(info) {
            println!("{}", line);
        }
    }

    /// Print the final success line
    pub fn print_download_complete(&self, outcome: &Outcome, elapsed: Duration) {
        self.success(&format!("Download complete: {}", outcome.path.display()));
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }

        println!("  Size: {}", format_bytes(outcome.byte_size));
        if outcome.duration > 0.0 {
            println!(
                "  Duration: {}",
                format_duration(Duration::from_secs_f64(outcome.duration))
            );
        }
        println!("  Time: {}", format_duration(elapsed));
    }

    /// Print the final failure line with its user-facing message
    pub fn print_failure(&self, err: &VdlError) {
        if matches!(err, VdlError::Cancelled) {
            self.warning(err.user_message());
            return;
        }

        self.error(err.user_message());
        if !err.detail().is_empty() {
            eprintln!("  {}", err.detail().dimmed());
        }
    }
}

fn progress_message(sample: &ProgressSample) -> String {
    format!("{} ETA {}", sample.speed_string(), sample.eta_string())
}

fn video_info_lines(info: &VideoInfo) -> Vec<String> {
    let mut lines = vec![
        format!("Title:     {}", info.title),
        format!("Uploader:  {}", info.uploader),
        format!("Platform:  {}", info.platform.display_name()),
        format!(
            "Duration:  {}",
            format_duration(Duration::from_secs_f64(info.duration.max(0.0)))
        ),
    ];

    let qualities = info.quality_labels();
    if !qualities.is_empty() {
        lines.push(format!("Qualities: {}", qualities.join(", ")));
    }
    if let Some(thumbnail) = &info.thumbnail {
        lines.push(format!("Thumbnail: {}", thumbnail));
    }
    if !info.id.is_empty() {
        lines.push(format!("ID:        {}", info.id));
    }
    lines
}
