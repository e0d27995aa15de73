//! Main entry point for the video-downloader CLI

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use video_downloader::cli::{Args, OutputFormatter, VerbosityLevel};
use video_downloader::config::{app_dir, Config, ConfigStore};
use video_downloader::core::{accept_url, progress_channel, Downloader};
use video_downloader::engine::{diagnose, probe_version, YtDlpEngine};
use video_downloader::logging::{file_appender, file_layer};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Keeps the file writer flushing until main returns
    let _log_guard = init_logging(args.verbosity_level());

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{:#}", e), "fatal error");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    debug!(?args, "parsed arguments");
    let mut formatter = OutputFormatter::new(args.verbosity_level());

    let store = args
        .config
        .clone()
        .map(ConfigStore::new)
        .unwrap_or_else(ConfigStore::default_location);
    let mut config = store.load();

    let destination = match &args.output_dir {
        Some(dir) => std::path::absolute(dir)
            .with_context(|| format!("cannot resolve output directory {}", dir.display()))?,
        None => config.download_directory.clone(),
    };

    let platform = match accept_url(&args.url) {
        Ok((_, platform)) => platform,
        Err(err) => {
            error!(url = %args.url, error = %err, kind = %err.kind(), "rejected URL");
            formatter.print_failure(&err);
            return Ok(ExitCode::from(err.exit_code()));
        }
    };
    info!(url = %args.url, platform = %platform, "platform detected");

    let engine_path = args.engine.clone().or_else(|| config.engine_path.clone());
    let engine = match YtDlpEngine::locate(engine_path.as_deref()) {
        Ok(engine) => engine.with_socket_timeout(args.timeout_duration()),
        Err(e) => {
            let err = diagnose(&e);
            error!(error = %e, "engine unavailable");
            formatter.print_failure(&err);
            return Ok(ExitCode::from(err.exit_code()));
        }
    };

    if let Some(version) = probe_version(engine.binary(), "--version").await {
        debug!(binary = %engine.binary().display(), %version, "engine found");
    }
    if !engine.has_muxer() {
        formatter.warning(
            "FFmpeg was not found. Only single-file formats can be downloaded, which may be lower quality; install FFmpeg to merge the best video and audio streams.",
        );
    }

    let downloader = Arc::new(Downloader::new(engine).with_format(args.format_preference()));

    if args.info {
        return Ok(match downloader.probe(&args.url).await {
            Ok(info) => {
                formatter.print_video_info(&info);
                ExitCode::SUCCESS
            }
            Err(err) => {
                formatter.print_failure(&err);
                ExitCode::from(err.exit_code())
            }
        });
    }

    formatter.print_download_start(platform, &destination);
    if !args.no_progress {
        formatter.create_progress_bar();
    }
    let formatter = Arc::new(formatter);

    let (progress, mut samples) = progress_channel();
    let renderer = {
        let formatter = formatter.clone();
        tokio::spawn(async move {
            while samples.changed().await.is_ok() {
                let latest = *samples.borrow_and_update();
                if let Some(sample) = latest {
                    formatter.update_progress(&sample);
                }
            }
        })
    };

    let started = Instant::now();
    let mut task = downloader.spawn_download(&args.url, &destination, progress);

    let joined = tokio::select! {
        joined = &mut task => joined,
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!("interrupt received, cancelling download");
            downloader.cancel().await;
            (&mut task).await
        }
    };
    let result = joined.context("download task failed")?;
    // The sender is gone once the download returns, so the renderer ends too
    let _ = renderer.await;

    let code = match result {
        Ok(outcome) => {
            formatter.finish_progress("done");
            formatter.print_download_complete(&outcome, started.elapsed());
            ExitCode::SUCCESS
        }
        Err(err) => {
            formatter.clear_progress();
            formatter.print_failure(&err);
            ExitCode::from(err.exit_code())
        }
    };

    if args.save_config {
        save_destination(&store, &mut config, destination, &formatter);
    }

    Ok(code)
}

fn save_destination(
    store: &ConfigStore,
    config: &mut Config,
    destination: PathBuf,
    formatter: &OutputFormatter,
) {
    config.set_download_directory(destination);
    match store.save(config) {
        Ok(()) => {
            info!(path = %store.path().display(), "configuration saved");
            formatter.info(&format!(
                "Download directory saved: {}",
                config.download_directory.display()
            ));
        }
        Err(err) => {
            warn!(path = %store.path().display(), error = %err, "configuration not saved");
            formatter.warning(&format!("Could not save configuration: {}", err.detail()));
        }
    }
}

/// Initialize logging: a timestamped log file plus a terminal layer
///
/// The terminal layer honours `RUST_LOG`, otherwise follows `--verbose`
/// and `--quiet`. If the log directory cannot be created only the
/// terminal layer is installed.
fn init_logging(verbosity: VerbosityLevel) -> Option<WorkerGuard> {
    let stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.stderr_filter()));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(stderr_filter);

    let log_dir = app_dir();
    let (file, guard, failure) = match file_appender(&log_dir) {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(file_layer(writer)), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file)
        .init();

    if let Some(e) = failure {
        warn!(directory = %log_dir.display(), error = %e.detail(), "log file unavailable");
    }

    guard
}
