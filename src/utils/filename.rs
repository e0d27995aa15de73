//! Safe filename generation utilities

use crate::error::VdlError;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Placeholder used when a title has no usable characters
pub const DEFAULT_PLACEHOLDER: &str = "video";

/// Longest base name in bytes; leaves room for " (N).ext" under the 255 limit
pub const MAX_BASE_NAME_BYTES: usize = 200;

static RESERVED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("static pattern"));

static WHITESPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static pattern"));

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Turn a video title into a filesystem-safe base name (no extension)
pub fn sanitize(raw_title: &str) -> String {
    sanitize_or(raw_title, DEFAULT_PLACEHOLDER)
}

/// Like [`sanitize`], falling back to `placeholder` when nothing usable remains
pub fn sanitize_or(raw_title: &str, placeholder: &str) -> String {
    let without_reserved = RESERVED_CHARS.replace_all(raw_title, "");
    let without_control: String = without_reserved
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let collapsed = WHITESPACE_RUNS.replace_all(&without_control, " ");

    let mut name = trim_name(&collapsed).to_string();

    if name.len() > MAX_BASE_NAME_BYTES {
        let mut cut = MAX_BASE_NAME_BYTES;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
        name = trim_name(&name).to_string();
    }

    if name.is_empty() {
        return placeholder.to_string();
    }

    if RESERVED_NAMES.contains(&name.to_uppercase().as_str()) {
        name.push('_');
    }

    name
}

fn trim_name(name: &str) -> &str {
    name.trim_matches(|c: char| c == '.' || c.is_whitespace())
}

/// Check if a filename is safe for the current filesystem
pub fn is_safe_filename(filename: &str) -> bool {
    if filename.is_empty() || filename.len() > 255 {
        return false;
    }

    if RESERVED_CHARS.is_match(filename) || filename.chars().any(|c| c.is_control()) {
        return false;
    }

    if let Some(stem) = Path::new(filename).file_stem().and_then(|s| s.to_str()) {
        if RESERVED_NAMES.contains(&stem.to_uppercase().as_str()) {
            return false;
        }
    }

    !(filename.starts_with('.')
        || filename.ends_with('.')
        || filename.starts_with(' ')
        || filename.ends_with(' '))
}

fn file_name(base_name: &str, extension: &str) -> String {
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        base_name.to_string()
    } else {
        format!("{}.{}", base_name, extension)
    }
}

/// Pick a path in `directory` that does not exist yet
///
/// Returns `base_name.extension` when free, otherwise the first free
/// `base_name (N).extension` for N = 1, 2, ... Only inspects the
/// filesystem; nothing is created.
pub fn resolve_conflict(directory: &Path, base_name: &str, extension: &str) -> PathBuf {
    let candidate = directory.join(file_name(base_name, extension));
    if !candidate.exists() {
        return candidate;
    }

    let mut counter: u64 = 1;
    loop {
        let numbered = format!("{} ({})", base_name, counter);
        let candidate = directory.join(file_name(&numbered, extension));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Create the download directory (and parents) if missing
pub fn ensure_directory(path: &Path) -> Result<(), VdlError> {
    std::fs::create_dir_all(path).map_err(|e| {
        VdlError::FileSystem(format!(
            "cannot create directory {}: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_removes_reserved_characters() {
        assert_eq!(sanitize("My Video: Part 1/2?"), "My Video Part 12");
        assert_eq!(sanitize(r#"a<b>c:d"e/f\g|h?i*j"#), "abcdefghij");
        assert_eq!(sanitize("Video with <invalid> chars"), "Video with invalid chars");
    }

    #[test]
    fn test_sanitize_collapses_whitespace_and_controls() {
        assert_eq!(sanitize("  lots   of\tspace\n\nhere  "), "lots of space here");
        assert_eq!(sanitize("bell\u{7}char"), "bell char");
        assert_eq!(sanitize("...hidden..."), "hidden");
    }

    #[test]
    fn test_sanitize_placeholder() {
        assert_eq!(sanitize(""), "video");
        assert_eq!(sanitize("???***"), "video");
        assert_eq!(sanitize_or(" / ", "telegram_video"), "telegram_video");
    }

    #[test]
    fn test_sanitize_never_contains_reserved() {
        let inputs = [
            "<>:\"/\\|?*",
            "title?with*many|reserved<chars>",
            "normal",
            "\u{0}\u{1f}x",
            "C:\\Users\\me\\video",
        ];
        for input in inputs {
            let out = sanitize(input);
            assert!(!out.is_empty());
            assert!(!RESERVED_CHARS.is_match(&out), "{out:?}");
            assert!(!out.chars().any(|c| c.is_control()), "{out:?}");
        }
    }

    #[test]
    fn test_sanitize_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        let out = sanitize(&long);
        assert!(out.len() <= MAX_BASE_NAME_BYTES);
        assert_eq!(out.chars().count(), MAX_BASE_NAME_BYTES / 2);

        let ascii = format!("{} tail", "a".repeat(250));
        assert_eq!(sanitize(&ascii).len(), MAX_BASE_NAME_BYTES);
    }

    #[test]
    fn test_sanitize_windows_reserved_names() {
        assert_eq!(sanitize("con"), "con_");
        assert_eq!(sanitize("LPT1"), "LPT1_");
        assert_eq!(sanitize("CONCERT"), "CONCERT");
    }

    #[test]
    fn test_is_safe_filename() {
        assert!(is_safe_filename("normal_file.mp4"));
        assert!(is_safe_filename("video with spaces.mp4"));
        assert!(!is_safe_filename("file<with>invalid:chars.mp4"));
        assert!(!is_safe_filename(""));
        assert!(!is_safe_filename(".hidden_file.mp4"));
        assert!(!is_safe_filename("NUL.mp4"));
        assert!(!is_safe_filename("trailing space .mp4 "));
    }

    #[test]
    fn test_resolve_conflict_free_path() {
        let dir = tempdir().unwrap();
        assert_eq!(resolve_conflict(dir.path(), "clip", "mp4"), dir.path().join("clip.mp4"));
        assert_eq!(resolve_conflict(dir.path(), "clip", ".mp4"), dir.path().join("clip.mp4"));
        assert_eq!(resolve_conflict(dir.path(), "clip", ""), dir.path().join("clip"));
    }

    #[test]
    fn test_resolve_conflict_numbering() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("clip.mp4"), b"x").unwrap();
        let first = resolve_conflict(dir.path(), "clip", "mp4");
        assert_eq!(first, dir.path().join("clip (1).mp4"));

        fs::write(&first, b"x").unwrap();
        assert_eq!(resolve_conflict(dir.path(), "clip", "mp4"), dir.path().join("clip (2).mp4"));
    }

    #[test]
    fn test_resolve_conflict_contiguous_run() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("clip.mp4"), b"x").unwrap();
        for n in 1..=5 {
            fs::write(dir.path().join(format!("clip ({}).mp4", n)), b"x").unwrap();
        }
        assert_eq!(resolve_conflict(dir.path(), "clip", "mp4"), dir.path().join("clip (6).mp4"));
    }

    #[test]
    fn test_resolve_conflict_does_not_touch_filesystem() {
        let dir = tempdir().unwrap();
        let _ = resolve_conflict(dir.path(), "clip", "mp4");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_ensure_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_directory(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_directory(&nested).unwrap();

        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();
        let err = ensure_directory(&file.join("child")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::FileSystem);
    }
}
