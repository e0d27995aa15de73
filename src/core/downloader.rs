//! Download orchestration
//!
//! [`Downloader`] validates and classifies a URL, hands the transfer to a
//! [`MediaEngine`], and turns whatever comes back into either an
//! [`Outcome`] or a [`VdlError`]. The engine writes under a random
//! staging stem inside the destination directory; the staged file is
//! renamed to its final, conflict-free name on success and every staged
//! artifact is removed on failure or cancellation.

use crate::core::progress::{ProgressReporter, ProgressSender};
use crate::core::video_info::{Outcome, VideoInfo};
use crate::engine::{diagnose, EngineReport, EngineRequest, FormatPreference, MediaEngine};
use crate::error::VdlError;
use crate::platform::{classify, supported_list, Platform};
use crate::utils::{ensure_directory, resolve_conflict, sanitize_or, validate_url};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Prefix of every staging file name
const STAGING_PREFIX: &str = ".vdl-";
const STAGING_TOKEN_LEN: usize = 12;

/// Runs one download at a time through a [`MediaEngine`]
pub struct Downloader {
    engine: Box<dyn MediaEngine>,
    format: FormatPreference,
    active: AtomicBool,
    cancel: Mutex<CancellationToken>,
    run_lock: tokio::sync::Mutex<()>,
}

impl Downloader {
    /// Create a downloader on top of `engine`
    pub fn new(engine: impl MediaEngine + 'static) -> Self {
        Self {
            engine: Box::new(engine),
            format: FormatPreference::default(),
            active: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Set format preference
    pub fn with_format(mut self, format: FormatPreference) -> Self {
        self.format = format;
        self
    }

    pub fn format(&self) -> FormatPreference {
        self.format
    }

    /// Whether a download is currently running
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Fetch metadata for `url` without downloading it
    pub async fn probe(&self, url: &str) -> Result<VideoInfo, VdlError> {
        let (url, platform) = match accept_url(url) {
            Ok(accepted) => accepted,
            Err(err) => {
                error!(url, error = %err, kind = %err.kind(), "probe rejected");
                return Err(err);
            }
        };

        let metadata = self.engine.probe(&url).await.map_err(|e| {
            let err = diagnose(&e);
            error!(url = %url, platform = %platform, error = %e, kind = %err.kind(), "probe failed");
            err
        })?;

        Ok(VideoInfo {
            id: metadata.id,
            title: metadata.title,
            uploader: metadata.uploader,
            duration: metadata.duration,
            thumbnail: metadata.thumbnail,
            available_heights: metadata.heights,
            platform,
        })
    }

    /// Download `url` into `destination`
    ///
    /// Progress samples are published on `progress` as the engine reports
    /// them. Fails immediately with [`VdlError::Validation`] for malformed
    /// or unsupported URLs and when another download is still running.
    pub async fn download(
        &self,
        url: &str,
        destination: &Path,
        progress: ProgressSender,
    ) -> Result<Outcome, VdlError> {
        let token = self.arm();
        self.download_with(url, destination, progress, token).await
    }

    /// Start [`download`](Self::download) on a new task
    ///
    /// The download is registered before the task is spawned, so a
    /// [`cancel`](Self::cancel) issued right after this returns stops it
    /// even if the task has not been polled yet.
    pub fn spawn_download(
        self: &Arc<Self>,
        url: &str,
        destination: &Path,
        progress: ProgressSender,
    ) -> JoinHandle<Result<Outcome, VdlError>> {
        let token = self.arm();
        let downloader = Arc::clone(self);
        let url = url.to_string();
        let destination = destination.to_path_buf();
        tokio::spawn(async move {
            downloader
                .download_with(&url, &destination, progress, token)
                .await
        })
    }

    /// Stop every started download, if any
    ///
    /// Returns once the running download has stopped and removed its
    /// staging files from the destination directory. Downloads started
    /// after this call are not affected.
    pub async fn cancel(&self) {
        let previous = std::mem::replace(
            &mut *self.cancel.lock().unwrap_or_else(PoisonError::into_inner),
            CancellationToken::new(),
        );
        previous.cancel();
        let _finished = self.run_lock.lock().await;
    }

    /// Token for a download about to start, tied to the current cancel epoch
    fn arm(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .child_token()
    }

    async fn download_with(
        &self,
        url: &str,
        destination: &Path,
        progress: ProgressSender,
        token: CancellationToken,
    ) -> Result<Outcome, VdlError> {
        let (url, platform) = match accept_url(url) {
            Ok(accepted) => accepted,
            Err(err) => {
                error!(url, error = %err, kind = %err.kind(), "download rejected");
                return Err(err);
            }
        };

        let Ok(_running) = self.run_lock.try_lock() else {
            let err = VdlError::Validation("a download is already in progress".to_string());
            error!(url = %url, platform = %platform, error = %err, kind = %err.kind(), "download refused");
            return Err(err);
        };

        if token.is_cancelled() {
            info!(url = %url, platform = %platform, "download cancelled before start");
            return Err(VdlError::Cancelled);
        }

        self.active.store(true, Ordering::SeqCst);

        let result = self
            .run(&url, platform, destination, progress, &token)
            .await;

        self.active.store(false, Ordering::SeqCst);

        match &result {
            Ok(outcome) => info!(
                url = %url,
                platform = %platform,
                path = %outcome.path.display(),
                bytes = outcome.byte_size,
                "download finished"
            ),
            Err(VdlError::Cancelled) => info!(url = %url, platform = %platform, "download cancelled"),
            Err(err) => error!(
                url = %url,
                platform = %platform,
                error = %err,
                kind = %err.kind(),
                "download failed"
            ),
        }

        result
    }

    async fn run(
        &self,
        url: &str,
        platform: Platform,
        destination: &Path,
        progress: ProgressSender,
        token: &CancellationToken,
    ) -> Result<Outcome, VdlError> {
        ensure_directory(destination)?;

        let request = EngineRequest {
            url: url.to_string(),
            directory: destination.to_path_buf(),
            staging_stem: staging_stem(),
            format: self.format,
        };
        let mut reporter = ProgressReporter::new(progress);

        info!(
            url,
            platform = %platform,
            directory = %destination.display(),
            engine = self.engine.name(),
            "starting download"
        );

        let fetched = self.engine.fetch(&request, &mut reporter, token).await;

        let report = match fetched {
            Ok(report) => report,
            Err(err) => {
                remove_staging(destination, &request.staging_stem);
                if token.is_cancelled() {
                    return Err(VdlError::Cancelled);
                }
                warn!(error = %err, "engine failed");
                return Err(diagnose(&err));
            }
        };

        debug!(bytes = reporter.published_bytes(), ?report, "engine finished");

        self.finalize(&report, destination, &request.staging_stem, platform)
            .inspect_err(|_| {
                remove_staging(destination, &request.staging_stem);
            })
    }

    fn finalize(
        &self,
        report: &EngineReport,
        destination: &Path,
        stem: &str,
        platform: Platform,
    ) -> Result<Outcome, VdlError> {
        let staged = if report.filepath.is_absolute() {
            report.filepath.clone()
        } else {
            destination.join(&report.filepath)
        };

        if !staged.is_file() {
            return Err(VdlError::Extraction(format!(
                "engine reported {} but no such file exists",
                staged.display()
            )));
        }

        let staged_name = staged
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !staged_name.starts_with(stem) {
            warn!(staged = %staged.display(), "engine wrote outside the staging name");
        }

        let extension = staged
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let title = report
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(platform.placeholder_title())
            .to_string();

        let base_name = sanitize_or(&title, platform.placeholder_title());
        let target = resolve_conflict(destination, &base_name, &extension);

        std::fs::rename(&staged, &target).map_err(|e| {
            VdlError::FileSystem(format!(
                "could not move {} to {}: {}",
                staged.display(),
                target.display(),
                e
            ))
        })?;

        let byte_size = std::fs::metadata(&target)
            .map(|m| m.len())
            .or_else(|_| report.filesize.ok_or(()))
            .unwrap_or(0);

        Ok(Outcome {
            path: target,
            title,
            platform,
            byte_size,
            duration: report.duration.unwrap_or(0.0),
        })
    }
}

/// Validate `url` and require a supported platform
///
/// Returns the normalized URL and its platform.
pub fn accept_url(url: &str) -> Result<(String, Platform), VdlError> {
    let parsed = validate_url(url)?;
    let platform = classify(parsed.as_str());
    if !platform.is_supported() {
        return Err(VdlError::Validation(format!(
            "Unsupported platform: {}. Supported platforms: {}",
            parsed.host_str().unwrap_or_default(),
            supported_list()
        )));
    }
    Ok((parsed.to_string(), platform))
}

fn staging_stem() -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STAGING_TOKEN_LEN)
        .map(char::from)
        .collect();
    format!("{}{}", STAGING_PREFIX, token)
}

/// Delete every entry in `directory` that belongs to the staging `stem`
///
/// Returns the number of entries removed.
fn remove_staging(directory: &Path, stem: &str) -> usize {
    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(directory = %directory.display(), error = %e, "cannot list staging directory");
            return 0;
        }
    };

    let dotted = format!("{}.", stem);
    let staged: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name == stem || name.starts_with(&dotted)
        })
        .map(|entry| entry.path())
        .collect();

    let mut removed = 0;
    for path in staged {
        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove staging file"),
        }
    }

    debug!(stem, removed, "staging files removed");
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::progress::{progress_channel, ProgressTick};
    use crate::engine::{EngineError, EngineMetadata};
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::sync::Notify;

    #[derive(Clone)]
    enum Script {
        Succeed {
            extension: &'static str,
            title: Option<&'static str>,
            ticks: Vec<ProgressTick>,
        },
        Fail {
            stderr: &'static str,
        },
        WaitForCancel,
    }

    struct FakeEngine {
        script: Script,
        calls: Arc<AtomicUsize>,
        started: Arc<Notify>,
    }

    impl FakeEngine {
        fn new(script: Script) -> Self {
            Self {
                script,
                calls: Arc::new(AtomicUsize::new(0)),
                started: Arc::new(Notify::new()),
            }
        }
    }

    fn staged(request: &EngineRequest, suffix: &str) -> PathBuf {
        request
            .directory
            .join(format!("{}.{}", request.staging_stem, suffix))
    }

    #[async_trait]
    impl MediaEngine for FakeEngine {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn probe(&self, url: &str) -> Result<EngineMetadata, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EngineMetadata {
                id: "abc123".to_string(),
                title: format!("probe of {}", url),
                uploader: "Channel".to_string(),
                duration: 61.0,
                thumbnail: None,
                heights: vec![720, 360],
            })
        }

        async fn fetch(
            &self,
            request: &EngineRequest,
            progress: &mut ProgressReporter,
            cancel: &CancellationToken,
        ) -> Result<EngineReport, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Succeed {
                    extension,
                    title,
                    ticks,
                } => {
                    for tick in ticks {
                        progress.report(*tick);
                    }
                    let path = staged(request, extension);
                    std::fs::write(&path, b"data").unwrap();
                    Ok(EngineReport {
                        filepath: path,
                        title: title.map(str::to_string),
                        duration: Some(12.0),
                        filesize: None,
                    })
                }
                Script::Fail { stderr } => {
                    std::fs::write(staged(request, "f137.mp4"), b"video").unwrap();
                    std::fs::write(staged(request, "f140.m4a.part"), b"aud").unwrap();
                    Err(EngineError::Failed {
                        tool: "fake".to_string(),
                        status: Some(1),
                        stderr: stderr.to_string(),
                    })
                }
                Script::WaitForCancel => {
                    progress.report(ProgressTick {
                        downloaded_bytes: 10,
                        total_bytes: Some(100),
                        ..Default::default()
                    });
                    std::fs::write(staged(request, "mp4.part"), b"partial").unwrap();
                    self.started.notify_one();
                    cancel.cancelled().await;
                    Err(EngineError::Cancelled)
                }
            }
        }
    }

    fn staging_leftovers(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(STAGING_PREFIX))
            .collect()
    }

    fn succeed(title: Option<&'static str>) -> Script {
        Script::Succeed {
            extension: "mp4",
            title,
            ticks: vec![
                ProgressTick {
                    downloaded_bytes: 100,
                    total_bytes: Some(1000),
                    ..Default::default()
                },
                ProgressTick {
                    downloaded_bytes: 1000,
                    total_bytes: Some(1000),
                    ..Default::default()
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_download_renames_to_sanitized_title() {
        let dir = tempdir().unwrap();
        let downloader = Downloader::new(FakeEngine::new(succeed(Some("My Video: Part 1/2?"))));
        let (tx, rx) = progress_channel();

        let outcome = downloader
            .download("https://youtu.be/abc123", dir.path(), tx)
            .await
            .unwrap();

        assert_eq!(outcome.path, dir.path().join("My Video Part 12.mp4"));
        assert!(outcome.path.is_file());
        assert_eq!(outcome.byte_size, 4);
        assert_eq!(outcome.platform, Platform::YouTube);
        assert_eq!(outcome.title, "My Video: Part 1/2?");
        assert_eq!(outcome.duration, 12.0);
        assert!(staging_leftovers(dir.path()).is_empty());

        let last = rx.borrow().unwrap();
        assert_eq!(last.downloaded_bytes, 1000);
        assert_eq!(last.fraction, Some(1.0));
        assert!(!downloader.is_active());
    }

    #[tokio::test]
    async fn test_download_resolves_name_conflicts() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"old").unwrap();
        let downloader = Downloader::new(FakeEngine::new(succeed(Some("clip"))));

        let (tx, _rx) = progress_channel();
        let first = downloader
            .download("https://t.me/channel/42", dir.path(), tx)
            .await
            .unwrap();
        assert_eq!(first.file_name(), "clip (1).mp4");

        let (tx, _rx) = progress_channel();
        let second = downloader
            .download("https://t.me/channel/42", dir.path(), tx)
            .await
            .unwrap();
        assert_eq!(second.file_name(), "clip (2).mp4");
        assert_eq!(second.platform, Platform::Telegram);
    }

    #[tokio::test]
    async fn test_missing_title_uses_platform_placeholder() {
        let dir = tempdir().unwrap();
        let downloader = Downloader::new(FakeEngine::new(succeed(None)));
        let (tx, _rx) = progress_channel();

        let outcome = downloader
            .download("https://www.instagram.com/reel/xyz/", dir.path(), tx)
            .await
            .unwrap();
        assert_eq!(outcome.file_name(), "instagram_video.mp4");
    }

    #[tokio::test]
    async fn test_destination_is_created() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let downloader = Downloader::new(FakeEngine::new(succeed(Some("clip"))));
        let (tx, _rx) = progress_channel();

        let outcome = downloader
            .download("https://fb.watch/xyz/", &nested, tx)
            .await
            .unwrap();
        assert_eq!(outcome.path, nested.join("clip.mp4"));
    }

    #[tokio::test]
    async fn test_unsupported_url_never_reaches_engine() {
        let dir = tempdir().unwrap();
        let engine = FakeEngine::new(succeed(Some("clip")));
        let calls = engine.calls.clone();
        let downloader = Downloader::new(engine);

        let (tx, _rx) = progress_channel();
        let err = tokio_test::assert_err!(
            downloader
                .download("https://example.com/video", dir.path(), tx)
                .await
        );
        assert_eq!(err.kind(), ErrorKind::Validation);

        let (tx, _rx) = progress_channel();
        let err = tokio_test::assert_err!(downloader.download("", dir.path(), tx).await);
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = tokio_test::assert_err!(downloader.probe("ftp://youtube.com/x").await);
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_engine_failure_is_classified_and_cleaned_up() {
        let dir = tempdir().unwrap();
        let downloader = Downloader::new(FakeEngine::new(Script::Fail {
            stderr: "ERROR: [youtube] abc123: Private video. Sign in if you've been granted access",
        }));
        let (tx, _rx) = progress_channel();

        let err = downloader
            .download("https://youtu.be/abc123", dir.path(), tx)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Access);
        assert!(staging_leftovers(dir.path()).is_empty());
        assert!(!downloader.is_active());
    }

    #[tokio::test]
    async fn test_network_failure_kind() {
        let dir = tempdir().unwrap();
        let downloader = Downloader::new(FakeEngine::new(Script::Fail {
            stderr: "ERROR: Unable to download webpage: Temporary failure in name resolution",
        }));
        let (tx, _rx) = progress_channel();

        let err = downloader
            .download("https://youtube.com/watch?v=abc", dir.path(), tx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_cancel_removes_partial_files() {
        let dir = tempdir().unwrap();
        let engine = FakeEngine::new(Script::WaitForCancel);
        let started = engine.started.clone();
        let downloader = Arc::new(Downloader::new(engine));

        let task = {
            let downloader = downloader.clone();
            let path = dir.path().to_path_buf();
            tokio::spawn(async move {
                let (tx, _rx) = progress_channel();
                downloader.download("https://youtu.be/abc123", &path, tx).await
            })
        };

        started.notified().await;
        assert!(downloader.is_active());
        assert_eq!(staging_leftovers(dir.path()).len(), 1);

        downloader.cancel().await;

        assert!(staging_leftovers(dir.path()).is_empty());
        assert!(!downloader.is_active());
        assert_eq!(task.await.unwrap(), Err(VdlError::Cancelled));
    }

    #[tokio::test]
    async fn test_second_download_is_refused_while_active() {
        let dir = tempdir().unwrap();
        let engine = FakeEngine::new(Script::WaitForCancel);
        let started = engine.started.clone();
        let calls = engine.calls.clone();
        let downloader = Arc::new(Downloader::new(engine));

        let task = {
            let downloader = downloader.clone();
            let path = dir.path().to_path_buf();
            tokio::spawn(async move {
                let (tx, _rx) = progress_channel();
                downloader.download("https://youtu.be/first", &path, tx).await
            })
        };
        started.notified().await;

        let (tx, _rx) = progress_channel();
        let err = downloader
            .download("https://youtu.be/second", dir.path(), tx)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            VdlError::Validation("a download is already in progress".to_string())
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        downloader.cancel().await;
        assert_eq!(task.await.unwrap(), Err(VdlError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_when_idle_returns() {
        let downloader = Downloader::new(FakeEngine::new(succeed(None)));
        downloader.cancel().await;
        assert!(!downloader.is_active());
    }

    #[tokio::test]
    async fn test_cancel_right_after_spawn_stops_download() {
        let dir = tempdir().unwrap();
        let engine = FakeEngine::new(Script::WaitForCancel);
        let calls = engine.calls.clone();
        let downloader = Arc::new(Downloader::new(engine));

        let (tx, _rx) = progress_channel();
        let task = downloader.spawn_download("https://youtu.be/abc123", dir.path(), tx);
        downloader.cancel().await;

        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("download should stop after cancel")
            .unwrap();
        assert_eq!(result, Err(VdlError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!downloader.is_active());
        assert!(staging_leftovers(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_idle_cancel_does_not_affect_later_download() {
        let dir = tempdir().unwrap();
        let downloader = Arc::new(Downloader::new(FakeEngine::new(succeed(Some("clip")))));
        downloader.cancel().await;

        let (tx, _rx) = progress_channel();
        let outcome = downloader
            .spawn_download("https://youtu.be/abc123", dir.path(), tx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.file_name(), "clip.mp4");
    }

    #[tokio::test]
    async fn test_probe_builds_video_info() {
        let downloader = Downloader::new(FakeEngine::new(succeed(None)));
        let info = downloader
            .probe("  youtube.com/watch?v=abc123  ")
            .await
            .unwrap();
        assert_eq!(info.platform, Platform::YouTube);
        assert_eq!(info.available_heights, vec![720, 360]);
        assert_eq!(info.best_quality(), Some("720p".to_string()));
    }

    #[test]
    fn test_staging_stem_shape() {
        let stem = staging_stem();
        assert!(stem.starts_with(STAGING_PREFIX));
        assert_eq!(stem.len(), STAGING_PREFIX.len() + STAGING_TOKEN_LEN);
        assert_ne!(stem, staging_stem());
    }

    #[test]
    fn test_remove_staging_only_touches_own_stem() {
        let dir = tempdir().unwrap();
        for name in [
            ".vdl-aaa.mp4.part",
            ".vdl-aaa.f137.mp4",
            ".vdl-aaa.temp.mp4",
            ".vdl-bbb.mp4.part",
            "keep.mp4",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        assert_eq!(remove_staging(dir.path(), ".vdl-aaa"), 3);
        let mut left: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec![".vdl-bbb.mp4.part", "keep.mp4"]);
    }
}
