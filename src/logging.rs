//! Log file setup
//!
//! Every run appends to `video_downloader.log` in the application
//! directory. Lines carry a local RFC 3339 timestamp and no ANSI colours.

use crate::config::LOG_FILE_NAME;
use crate::error::VdlError;
use std::path::Path;
use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Filtered;
use tracing_subscriber::fmt::format::{DefaultFields, Format, Full};
use tracing_subscriber::fmt::{self, time::ChronoLocal, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

/// Layer type returned by [`file_layer`]
pub type FileLayer<S, W> =
    Filtered<fmt::Layer<S, DefaultFields, Format<Full, ChronoLocal>, W>, EnvFilter, S>;

/// Open the log file in `dir` for appending, creating the directory first
pub fn file_appender(dir: &Path) -> Result<RollingFileAppender, VdlError> {
    std::fs::create_dir_all(dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(dir)
        .map_err(|e| {
            VdlError::FileSystem(format!("cannot open log file in {}: {}", dir.display(), e))
        })
}

/// Timestamped plain-text layer at `info` and above
pub fn file_layer<S, W>(writer: W) -> FileLayer<S, W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(ChronoLocal::rfc_3339())
        .with_filter(EnvFilter::new("info"))
}
