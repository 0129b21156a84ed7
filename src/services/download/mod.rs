//! Image download service.
//!
//! Reads `(image_uri, image_name)` pairs from an export file and saves each
//! image into a directory. Separated from UI concerns - emits events for
//! progress tracking.

mod types;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::error::CrawlError;
use crate::scrapers::HttpClient;
use crate::services::export::read_rows;
use crate::utils::{with_retry, RetryPolicy};

pub use types::{
    DownloadConfig, DownloadError, DownloadEvent, DownloadFailure, DownloadResult, ImageJob,
};

/// Load the download jobs listed in an export file.
///
/// Only `image_uri` and `image_name` are read; other columns may be absent
/// or hold anything.
pub fn jobs_from_export(path: &Path) -> Result<Vec<ImageJob>, CrawlError> {
    read_rows(path)
}

/// Destination for `image_name` inside `dir`, rejecting names that would
/// escape it.
fn target_path(dir: &Path, image_name: &str) -> Result<PathBuf, DownloadError> {
    let file_name = Path::new(image_name.trim())
        .file_name()
        .filter(|name| Path::new(name) == Path::new(image_name.trim()))
        .ok_or_else(|| DownloadError::InvalidName(image_name.to_string()))?;
    Ok(dir.join(file_name))
}

/// GET one image and verify its length against the Content-Length header.
async fn fetch_image(client: &HttpClient, url: &str) -> Result<Vec<u8>, DownloadError> {
    let response = client.get(url).await?;
    if !response.is_success() {
        return Err(DownloadError::Status(response.status.as_u16()));
    }

    let expected = response.content_length();
    let content = response.bytes().await?;
    if let Some(expected) = expected {
        let actual = content.len() as u64;
        if actual != expected {
            return Err(DownloadError::LengthMismatch { expected, actual });
        }
    }
    Ok(content)
}

/// Fetch with retries, then write to `path`. Returns the bytes written.
async fn download_one(
    client: &HttpClient,
    retry: &RetryPolicy,
    job: &ImageJob,
    path: &Path,
) -> Result<u64, DownloadError> {
    let what = format!("Download of {}", job.image_uri);
    let content = with_retry(
        retry,
        &what,
        || fetch_image(client, &job.image_uri),
        DownloadError::is_retryable,
    )
    .await?;

    tokio::fs::write(path, &content)
        .await
        .map_err(|source| DownloadError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(content.len() as u64)
}

/// Service for downloading the images listed in an export file.
pub struct ImageDownloadService {
    client: HttpClient,
    config: DownloadConfig,
}

impl ImageDownloadService {
    /// Create a new download service.
    pub fn new(client: HttpClient, config: DownloadConfig) -> Self {
        Self { client, config }
    }

    /// Download every job.
    ///
    /// `config.workers` tasks share the queue; each emits progress on
    /// `event_tx`. Per-image failures are counted, never fatal.
    pub async fn download(
        &self,
        jobs: Vec<ImageJob>,
        event_tx: mpsc::Sender<DownloadEvent>,
    ) -> Result<DownloadResult, CrawlError> {
        tokio::fs::create_dir_all(&self.config.image_dir).await?;

        let total = jobs.len();
        let workers = self.config.workers.clamp(1, total.max(1));
        info!(
            "Downloading {} images into {} with {} worker(s)",
            total,
            self.config.image_dir.display(),
            workers
        );

        let queue = Arc::new(Mutex::new(VecDeque::from(jobs)));
        let downloaded = Arc::new(AtomicUsize::new(0));
        let skipped = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let client = self.client.clone();
            let image_dir = self.config.image_dir.clone();
            let overwrite = self.config.overwrite;
            let retry = self.config.retry;
            let queue = queue.clone();
            let downloaded = downloaded.clone();
            let skipped = skipped.clone();
            let failures = failures.clone();
            let event_tx = event_tx.clone();

            let handle = tokio::spawn(async move {
                loop {
                    // Claim the next job
                    let Some(job) = queue.lock().await.pop_front() else {
                        break;
                    };
                    let url = job.image_uri.clone();

                    let result = match target_path(&image_dir, &job.image_name) {
                        Ok(path) => {
                            if !overwrite && tokio::fs::try_exists(&path).await.unwrap_or(false) {
                                debug!("{} already exists, skipping", path.display());
                                skipped.fetch_add(1, Ordering::Relaxed);
                                let _ = event_tx
                                    .send(DownloadEvent::Skipped {
                                        worker_id,
                                        url,
                                        path,
                                    })
                                    .await;
                                continue;
                            }

                            let _ = event_tx
                                .send(DownloadEvent::Started {
                                    worker_id,
                                    url: url.clone(),
                                    filename: job.image_name.clone(),
                                })
                                .await;

                            download_one(&client, &retry, &job, &path)
                                .await
                                .map(|bytes| (path, bytes))
                        }
                        Err(e) => Err(e),
                    };

                    match result {
                        Ok((path, bytes)) => {
                            downloaded.fetch_add(1, Ordering::Relaxed);
                            let _ = event_tx
                                .send(DownloadEvent::Completed {
                                    worker_id,
                                    url,
                                    path,
                                    bytes,
                                })
                                .await;
                        }
                        Err(e) => {
                            warn!("Failed to download {}: {}", url, e);
                            failures.lock().await.push(DownloadFailure {
                                url: url.clone(),
                                error: e.to_string(),
                            });
                            let _ = event_tx
                                .send(DownloadEvent::Failed {
                                    worker_id,
                                    url,
                                    error: e.to_string(),
                                })
                                .await;
                        }
                    }
                }
            });

            handles.push(handle);
        }

        // Wait for all workers
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Download worker ended abnormally: {}", e);
            }
        }

        let failures = std::mem::take(&mut *failures.lock().await);
        let result = DownloadResult {
            downloaded: downloaded.load(Ordering::Relaxed),
            skipped: skipped.load(Ordering::Relaxed),
            failed: failures.len(),
            failures,
        };
        info!(
            "Images: {} downloaded, {} skipped, {} failed",
            result.downloaded, result.skipped, result.failed
        );
        Ok(result)
    }
}
