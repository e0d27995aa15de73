//! Error types for video-downloader

use std::fmt;
use thiserror::Error;

/// Category of a failed operation, as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Network,
    Access,
    FileSystem,
    Extraction,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Network => "network",
            ErrorKind::Access => "access",
            ErrorKind::FileSystem => "filesystem",
            ErrorKind::Extraction => "extraction",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for video-downloader operations
///
/// Every failure that crosses back to the front end is one of these
/// variants. Raw engine errors are diagnosed into them inside the
/// orchestrator and never escape on their own.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VdlError {
    /// Malformed or unsupported URL, or a request the tool refuses
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Connectivity, DNS or timeout problems
    #[error("Network error: {0}")]
    Network(String),

    /// Private, region-locked, deleted or login-only content
    #[error("Access denied: {0}")]
    Access(String),

    /// Permission, disk space or path problems
    #[error("File system error: {0}")]
    FileSystem(String),

    /// The engine could not parse the page or stream
    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Download cancelled")]
    Cancelled,
}

impl VdlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VdlError::Validation(_) => ErrorKind::Validation,
            VdlError::Network(_) => ErrorKind::Network,
            VdlError::Access(_) => ErrorKind::Access,
            VdlError::FileSystem(_) => ErrorKind::FileSystem,
            VdlError::Extraction(_) => ErrorKind::Extraction,
            VdlError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Underlying detail message
    pub fn detail(&self) -> &str {
        match self {
            VdlError::Validation(msg)
            | VdlError::Network(msg)
            | VdlError::Access(msg)
            | VdlError::FileSystem(msg)
            | VdlError::Extraction(msg) => msg,
            VdlError::Cancelled => "cancelled by user",
        }
    }

    /// Fixed user-facing sentence for this error's category
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "The URL is invalid or its platform is not supported.",
            ErrorKind::Network => "Network error: please check your internet connection.",
            ErrorKind::Access => "Video is private, restricted, or unavailable.",
            ErrorKind::FileSystem => "Could not write the file to the download directory.",
            ErrorKind::Extraction => "The video could not be extracted from the page.",
            ErrorKind::Cancelled => "Download cancelled by user.",
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::Validation => 2,
            ErrorKind::Network => 3,
            ErrorKind::Access => 4,
            ErrorKind::FileSystem => 5,
            ErrorKind::Extraction => 6,
            ErrorKind::Cancelled => 130,
        }
    }
}

impl From<std::io::Error> for VdlError {
    fn from(err: std::io::Error) -> Self {
        VdlError::FileSystem(err.to_string())
    }
}
