//! Utility functions for URLs and file names

pub mod filename;
pub mod url;

pub use filename::*;
pub use url::*;
