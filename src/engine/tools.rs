//! Locating external binaries (yt-dlp, ffmpeg)

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// yt-dlp binary name
pub const YTDLP: &str = "yt-dlp";
/// FFmpeg binary name
pub const FFMPEG: &str = "ffmpeg";

const COMMON_DIRS: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];

fn executable_name(name: &str) -> String {
    if cfg!(windows) && !name.ends_with(".exe") {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Find `name` on `PATH`, in common install prefixes, or in `~/.local/bin`
///
/// An explicit path wins when it points at an existing file.
pub fn find_executable(name: &str, explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.is_file().then(|| path.to_path_buf());
    }

    let file_name = executable_name(name);
    let path_dirs = std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).collect::<Vec<_>>())
        .unwrap_or_default();

    let local_bin = dirs::home_dir().map(|home| home.join(".local").join("bin"));

    let found = path_dirs
        .into_iter()
        .chain(COMMON_DIRS.iter().map(PathBuf::from))
        .chain(local_bin)
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file());

    debug!(tool = name, found = ?found, "executable lookup");
    found
}

/// Run `<path> <flag>` and return the first line of its output
pub async fn probe_version(path: &Path, flag: &str) -> Option<String> {
    let output = Command::new(path)
        .arg(flag)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
}
