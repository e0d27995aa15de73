//! `yt-dlp` process driver

use super::tools::{find_executable, FFMPEG, YTDLP};
use super::{EngineError, EngineMetadata, EngineReport, EngineRequest, FormatPreference, MediaEngine};
use crate::core::progress::{ProgressReporter, ProgressTick};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Prefix of progress lines produced by our progress template
pub const PROGRESS_MARKER: &str = "vdl-progress ";
/// Prefix of the final metadata line
pub const RESULT_MARKER: &str = "vdl-result ";

const PROGRESS_TEMPLATE: &str = "download:vdl-progress %(progress.downloaded_bytes)s|%(progress.total_bytes,progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.eta)s";
const RESULT_TEMPLATE: &str =
    "after_move:vdl-result %(.{title,filepath,duration,filesize,filesize_approx})j";

/// Engine backed by the `yt-dlp` binary
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    binary: PathBuf,
    ffmpeg: Option<PathBuf>,
    socket_timeout: Duration,
}

impl YtDlpEngine {
    /// Create an engine for a known yt-dlp binary
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            ffmpeg: None,
            socket_timeout: Duration::from_secs(30),
        }
    }

    /// Find yt-dlp (and FFmpeg, if installed) on this machine
    pub fn locate(explicit: Option<&Path>) -> Result<Self, EngineError> {
        let binary = find_executable(YTDLP, explicit).ok_or_else(|| EngineError::Missing {
            tool: YTDLP.to_string(),
        })?;
        let ffmpeg = find_executable(FFMPEG, None);
        if ffmpeg.is_none() {
            warn!("ffmpeg not found; separate audio and video streams cannot be merged");
        }

        Ok(Self::new(binary).with_ffmpeg(ffmpeg))
    }

    /// Set FFmpeg location used for merging and audio extraction
    pub fn with_ffmpeg(mut self, ffmpeg: Option<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg;
        self
    }

    /// Set network socket timeout
    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Whether the muxing binary is available
    pub fn has_muxer(&self) -> bool {
        self.ffmpeg.is_some()
    }

    /// Format selection arguments for a preference
    pub fn format_args(&self, preference: FormatPreference) -> Vec<String> {
        let mut args = Vec::new();
        match (preference, self.has_muxer()) {
            (FormatPreference::BestVideoAudio, true) => {
                args.extend([
                    "-f".to_string(),
                    "bv*[ext=mp4]+ba[ext=m4a]/bv*+ba/b[ext=mp4]/b".to_string(),
                    "--merge-output-format".to_string(),
                    "mp4".to_string(),
                ]);
            }
            (FormatPreference::BestVideoAudio, false) => {
                args.extend(["-f".to_string(), "b[ext=mp4]/b".to_string()]);
            }
            (FormatPreference::AudioOnly, true) => {
                args.extend([
                    "-f".to_string(),
                    "ba/b".to_string(),
                    "-x".to_string(),
                    "--audio-format".to_string(),
                    "mp3".to_string(),
                    "--audio-quality".to_string(),
                    "192K".to_string(),
                ]);
            }
            (FormatPreference::AudioOnly, false) => {
                args.extend(["-f".to_string(), "ba/b".to_string()]);
            }
        }

        if let Some(ffmpeg) = &self.ffmpeg {
            args.push("--ffmpeg-location".to_string());
            args.push(ffmpeg.to_string_lossy().into_owned());
        }

        args
    }

    /// Full argument list for a download
    pub fn download_args(&self, request: &EngineRequest) -> Vec<String> {
        let mut args = self.format_args(request.format);
        args.extend([
            "--no-playlist".to_string(),
            "--no-mtime".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--no-simulate".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout.as_secs().max(1).to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "--print".to_string(),
            RESULT_TEMPLATE.to_string(),
            "-o".to_string(),
            request.output_template(),
            "--".to_string(),
            request.url.clone(),
        ]);
        args
    }

    /// Argument list for a metadata probe
    pub fn probe_args(&self, url: &str) -> Vec<String> {
        vec![
            "--dump-single-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--skip-download".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout.as_secs().max(1).to_string(),
            "--".to_string(),
            url.to_string(),
        ]
    }

    fn command(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so FFmpeg and other helpers can be stopped with the engine
        #[cfg(unix)]
        command.process_group(0);
        command
    }

    fn spawn_error(&self, err: std::io::Error) -> EngineError {
        if err.kind() == std::io::ErrorKind::NotFound {
            EngineError::Missing {
                tool: YTDLP.to_string(),
            }
        } else {
            EngineError::Io {
                tool: YTDLP.to_string(),
                source: err,
            }
        }
    }
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        YTDLP
    }

    async fn probe(&self, url: &str) -> Result<EngineMetadata, EngineError> {
        let args = self.probe_args(url);
        debug!(binary = %self.binary.display(), ?args, "probing");

        let output = self
            .command(&args)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(EngineError::Failed {
                tool: YTDLP.to_string(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        parse_metadata(&output.stdout)
    }

    async fn fetch(
        &self,
        request: &EngineRequest,
        progress: &mut ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<EngineReport, EngineError> {
        let args = self.download_args(request);
        debug!(binary = %self.binary.display(), ?args, "spawning engine");

        let mut child = self.command(&args).spawn().map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Malformed("engine stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Malformed("engine stderr not captured".to_string()))?;

        // With --print the engine runs quiet and progress moves to stderr,
        // so both streams are scanned for our markers.
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_lines(stdout, tx.clone(), OutputLine::Stdout);
        forward_lines(stderr, tx, OutputLine::Stderr);

        let mut report: Option<EngineReport> = None;
        let mut diagnostics = String::new();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("cancellation requested, stopping engine");
                    terminate(&mut child).await;
                    return Err(EngineError::Cancelled);
                }
                line = rx.recv() => {
                    let Some(line) = line else { break };
                    let (text, from_stderr) = match line {
                        OutputLine::Stdout(text) => (text, false),
                        OutputLine::Stderr(text) => (text, true),
                    };

                    if let Some(tick) = parse_progress_line(&text) {
                        progress.report(tick);
                    } else if let Some(parsed) = parse_report_line(&text) {
                        report = Some(parsed?);
                    } else if from_stderr {
                        debug!(target: "engine", "{}", text);
                        diagnostics.push_str(&text);
                        diagnostics.push('\n');
                    } else {
                        debug!(target: "engine", "{}", text);
                    }
                }
            }
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                terminate(&mut child).await;
                return Err(EngineError::Cancelled);
            }
            status = child.wait() => status.map_err(|e| EngineError::Io {
                tool: YTDLP.to_string(),
                source: e,
            })?,
        };

        if !status.success() {
            return Err(EngineError::Failed {
                tool: YTDLP.to_string(),
                status: status.code(),
                stderr: diagnostics,
            });
        }

        report.ok_or_else(|| {
            EngineError::Malformed("engine finished without reporting an output file".to_string())
        })
    }
}

/// Kill the engine together with every helper it started
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        let group = format!("-{}", pid);
        let killed = Command::new("kill")
            .args(["-KILL", "--", group.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(e) = killed {
            warn!(pid, error = %e, "could not signal engine process group");
        }
    }
    if let Err(e) = child.kill().await {
        debug!(error = %e, "engine already exited");
    }
}

#[derive(Debug)]
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<OutputLine>, wrap: fn(String) -> OutputLine)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(wrap(line)).is_err() {
                break;
            }
        }
    });
}

fn parse_number(field: &str) -> Option<f64> {
    let field = field.trim();
    if field.is_empty() || field.eq_ignore_ascii_case("na") || field.eq_ignore_ascii_case("none") {
        return None;
    }
    field.parse::<f64>().ok().filter(|n| n.is_finite() && *n >= 0.0)
}

/// Parse a `vdl-progress downloaded|total|speed|eta` line
pub fn parse_progress_line(line: &str) -> Option<ProgressTick> {
    let rest = line.trim().strip_prefix(PROGRESS_MARKER.trim_end())?;
    let mut fields = rest.trim().split('|');

    let downloaded = parse_number(fields.next()?)?;
    let total = fields.next().and_then(parse_number);
    let speed = fields.next().and_then(parse_number);
    let eta = fields.next().and_then(parse_number);

    Some(ProgressTick {
        downloaded_bytes: downloaded as u64,
        total_bytes: total.map(|t| t as u64),
        speed,
        eta: eta.map(|secs| Duration::from_secs(secs as u64)),
    })
}

#[derive(Debug, Deserialize)]
struct RawReport {
    title: Option<String>,
    filepath: Option<String>,
    duration: Option<f64>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
}

/// Parse a `vdl-result {json}` line. `None` when the line is something else.
pub fn parse_report_line(line: &str) -> Option<Result<EngineReport, EngineError>> {
    let json = line.trim().strip_prefix(RESULT_MARKER.trim_end())?;

    let parsed = serde_json::from_str::<RawReport>(json.trim())
        .map_err(|e| EngineError::Malformed(format!("bad result line: {}", e)))
        .and_then(|raw| {
            let filepath = raw
                .filepath
                .filter(|p| !p.is_empty())
                .ok_or_else(|| EngineError::Malformed("result line has no filepath".to_string()))?;
            Ok(EngineReport {
                filepath: PathBuf::from(filepath),
                title: raw.title,
                duration: raw.duration,
                filesize: raw.filesize.or(raw.filesize_approx).map(|s| s as u64),
            })
        });

    Some(parsed)
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

/// Parse `--dump-single-json` output
pub fn parse_metadata(stdout: &[u8]) -> Result<EngineMetadata, EngineError> {
    let raw: RawInfo = serde_json::from_slice(stdout)
        .map_err(|e| EngineError::Malformed(format!("invalid metadata JSON: {}", e)))?;

    let mut heights: Vec<u32> = raw.formats.iter().filter_map(|f| f.height).collect();
    heights.sort_unstable_by(|a, b| b.cmp(a));
    heights.dedup();

    Ok(EngineMetadata {
        id: raw.id.unwrap_or_default(),
        title: raw.title.unwrap_or_else(|| "Unknown".to_string()),
        uploader: raw.uploader.unwrap_or_else(|| "Unknown".to_string()),
        duration: raw.duration.unwrap_or(0.0),
        thumbnail: raw.thumbnail,
        heights,
    })
}
