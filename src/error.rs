//! Top-level error type and process exit codes.

use std::path::PathBuf;

use crate::scrapers::RenderError;

/// Errors that end a crawl or download run.
///
/// Recoverable per-item problems (a missing field, one page that never
/// rendered, one image that failed) are not represented here; they are
/// collected into run reports instead.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Page renderer unavailable: {0}")]
    Renderer(#[from] RenderError),

    #[error("Could not find the input file at {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Could not read {}: {source}", path.display())]
    InputInvalid {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write export file {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CrawlError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CrawlError::Config(_) => 2,
            CrawlError::Renderer(_) => 3,
            CrawlError::InputNotFound(_) => 4,
            CrawlError::InputInvalid { .. } => 5,
            CrawlError::Export { .. } => 6,
            CrawlError::Http(_) | CrawlError::Io(_) => 1,
        }
    }
}
