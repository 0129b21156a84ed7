//! Image download service types and events.

use std::path::PathBuf;

use serde::Deserialize;

use crate::utils::RetryPolicy;

/// One image to fetch: the two export columns the fetcher reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageJob {
    pub image_uri: String,
    pub image_name: String,
}

/// Events emitted during download operations.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// Download started for a URL
    Started {
        worker_id: usize,
        url: String,
        filename: String,
    },
    /// Image written to disk
    Completed {
        worker_id: usize,
        url: String,
        path: PathBuf,
        bytes: u64,
    },
    /// Target file already present
    Skipped {
        worker_id: usize,
        url: String,
        path: PathBuf,
    },
    /// Download failed after all retries
    Failed {
        worker_id: usize,
        url: String,
        error: String,
    },
}

/// A download that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFailure {
    pub url: String,
    pub error: String,
}

/// Result of a download operation.
#[derive(Debug, Default)]
pub struct DownloadResult {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<DownloadFailure>,
}

/// Configuration for the image download service.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub image_dir: PathBuf,
    pub workers: usize,
    pub overwrite: bool,
    pub retry: RetryPolicy,
}

/// Why a single image could not be saved.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("expected {expected} bytes, received {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("unusable image name '{0}'")]
    InvalidName(String),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Transient network problems are retried; client errors and disk
    /// failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::Http(_) | DownloadError::LengthMismatch { .. } => true,
            DownloadError::Status(status) => *status == 429 || *status >= 500,
            DownloadError::InvalidName(_) | DownloadError::Write { .. } => false,
        }
    }
}
