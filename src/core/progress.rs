//! Progress tracking for downloads

use std::time::Duration;
use tokio::sync::watch;

/// One raw progress report from the engine for the stream it is currently fetching
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProgressTick {
    /// Bytes of the current stream received so far
    pub downloaded_bytes: u64,
    /// Size of the current stream, exact or estimated
    pub total_bytes: Option<u64>,
    /// Bytes per second
    pub speed: Option<f64>,
    /// Estimated time remaining for the current stream
    pub eta: Option<Duration>,
}

/// Progress of a whole download, as published to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProgressSample {
    /// Bytes received across all streams of this download
    pub downloaded_bytes: u64,
    /// Known total across all streams seen so far
    pub total_bytes: Option<u64>,
    /// Current transfer rate in bytes per second
    pub speed: Option<f64>,
    /// Estimated time remaining
    pub eta: Option<Duration>,
    /// Fraction complete in `0.0..=1.0`, when the total is known
    pub fraction: Option<f64>,
}

impl ProgressSample {
    /// Progress as a percentage (0.0 to 100.0)
    pub fn percent(&self) -> Option<f64> {
        self.fraction.map(|f| f * 100.0)
    }

    /// Get human-readable speed string
    pub fn speed_string(&self) -> String {
        match self.speed {
            Some(speed) if speed > 0.0 => format_bytes_per_second(speed),
            _ => "N/A".to_string(),
        }
    }

    /// Get human-readable ETA string
    pub fn eta_string(&self) -> String {
        match self.eta {
            Some(eta) => format_duration(eta),
            None => "N/A".to_string(),
        }
    }
}

/// Sending half of the progress channel
pub type ProgressSender = watch::Sender<Option<ProgressSample>>;
/// Receiving half of the progress channel
pub type ProgressReceiver = watch::Receiver<Option<ProgressSample>>;

/// Create a progress channel holding the latest sample only
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    watch::channel(None)
}

/// Turns engine ticks into monotone [`ProgressSample`]s and publishes them
///
/// When separate video and audio streams are fetched, the engine's byte
/// counter restarts for the second stream. Finished streams are folded
/// into an offset so published byte counts never go down.
#[derive(Debug)]
pub struct ProgressReporter {
    sender: ProgressSender,
    finished_bytes: u64,
    finished_total: u64,
    stream_bytes: u64,
    stream_total: Option<u64>,
    published: u64,
}

impl ProgressReporter {
    pub fn new(sender: ProgressSender) -> Self {
        Self {
            sender,
            finished_bytes: 0,
            finished_total: 0,
            stream_bytes: 0,
            stream_total: None,
            published: 0,
        }
    }

    /// Fold a tick into the running totals and publish the resulting sample
    pub fn report(&mut self, tick: ProgressTick) -> ProgressSample {
        if tick.downloaded_bytes < self.stream_bytes {
            // Counter went backwards: a new stream started.
            self.finished_bytes += self.stream_bytes;
            self.finished_total += self.stream_total.unwrap_or(self.stream_bytes).max(self.stream_bytes);
        }
        self.stream_bytes = tick.downloaded_bytes;
        self.stream_total = tick.total_bytes;

        let downloaded = (self.finished_bytes + tick.downloaded_bytes).max(self.published);
        let total = tick
            .total_bytes
            .map(|t| (self.finished_total + t).max(downloaded));
        let fraction = total
            .filter(|t| *t > 0)
            .map(|t| (downloaded as f64 / t as f64).clamp(0.0, 1.0));

        let sample = ProgressSample {
            downloaded_bytes: downloaded,
            total_bytes: total,
            speed: tick.speed.filter(|s| s.is_finite() && *s >= 0.0),
            eta: tick.eta,
            fraction,
        };

        self.published = downloaded;
        // No receiver left just means nobody is rendering.
        let _ = self.sender.send(Some(sample));
        sample
    }

    /// Latest byte count published
    pub fn published_bytes(&self) -> u64 {
        self.published
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f64 = bytes as f64;
    let exp = (bytes_f64.ln() / THRESHOLD.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);

    let value = bytes_f64 / THRESHOLD.powi(exp as i32);

    if exp == 0 {
        format!("{} {}", bytes, UNITS[exp])
    } else {
        format!("{:.1} {}", value, UNITS[exp])
    }
}

/// Format bytes per second as human-readable string
pub fn format_bytes_per_second(bytes_per_second: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_second as u64))
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    if total_seconds < 60 {
        format!("{}s", total_seconds)
    } else if total_seconds < 3600 {
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        if seconds == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}m {}s", minutes, seconds)
        }
    } else {
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        if minutes == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, minutes)
        }
    }
}
