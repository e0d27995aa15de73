//! Persistent user configuration
//!
//! A small JSON file under `~/.video_downloader/` holding the preferred
//! download directory. A missing, unreadable or malformed file never
//! fails the caller; defaults are used instead.

use crate::error::VdlError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Per-user application directory name under the home directory
pub const APP_DIR_NAME: &str = ".video_downloader";
/// Config file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.json";
/// Log file name inside the application directory
pub const LOG_FILE_NAME: &str = "video_downloader.log";
/// Subdirectory of the user's downloads folder used by default
pub const DEFAULT_SUBDIR: &str = "VideoDownloader";

/// User preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Where finished downloads are stored
    pub download_directory: PathBuf,
    /// Explicit path to the yt-dlp binary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_directory: default_download_directory(),
            engine_path: None,
        }
    }
}

impl Config {
    /// Update download directory preference
    pub fn set_download_directory(&mut self, path: impl Into<PathBuf>) {
        self.download_directory = path.into();
    }
}

/// `~/.video_downloader`, or a relative fallback when no home directory exists
pub fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// `<downloads>/VideoDownloader`, always absolute
pub fn default_download_directory() -> PathBuf {
    download_directory_from(dirs::download_dir(), dirs::home_dir())
}

fn download_directory_from(downloads: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    downloads
        .filter(|dir| dir.is_absolute())
        .or_else(|| {
            home.filter(|dir| dir.is_absolute())
                .map(|home| home.join("Downloads"))
        })
        .unwrap_or_else(|| {
            std::path::absolute("Downloads")
                .unwrap_or_else(|_| std::env::temp_dir().join("Downloads"))
        })
        .join(DEFAULT_SUBDIR)
}

/// Loads and saves [`Config`] at a fixed path
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.video_downloader/config.json`
    pub fn default_location() -> Self {
        Self::new(app_dir().join(CONFIG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the config file, falling back to defaults on any problem
    pub fn load(&self) -> Config {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no config file, using defaults");
                return Config::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "config file unreadable, using defaults");
                return Config::default();
            }
        };

        match serde_json::from_str::<Config>(&contents) {
            Ok(config) if config.download_directory.is_absolute() => config,
            Ok(config) => {
                warn!(
                    path = %self.path.display(),
                    directory = %config.download_directory.display(),
                    "download directory is not absolute, using defaults"
                );
                Config::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "config file malformed, using defaults");
                Config::default()
            }
        }
    }

    /// Write the config file, creating its parent directory if needed
    pub fn save(&self, config: &Config) -> Result<(), VdlError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                VdlError::FileSystem(format!(
                    "cannot create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(config)
            .map_err(|e| VdlError::FileSystem(format!("cannot serialize config: {}", e)))?;

        std::fs::write(&self.path, json).map_err(|e| {
            VdlError::FileSystem(format!(
                "cannot write config file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(path = %self.path.display(), "config saved");
        Ok(())
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::default_location()
    }
}
