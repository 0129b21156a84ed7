//! Images command: download every image listed in an export file.

use std::path::Path;

use console::style;
use tokio::sync::mpsc;

use crate::config::{resolve_image_dir, Settings};
use crate::services::{
    jobs_from_export, DownloadConfig, DownloadEvent, ImageDownloadService,
};

/// Download the images listed in `input` (or the configured output file).
pub async fn cmd_images(
    settings: &Settings,
    input: Option<&Path>,
    overwrite: bool,
) -> anyhow::Result<()> {
    let input = input.unwrap_or(settings.output.as_path());
    let jobs = jobs_from_export(input)?;

    if jobs.is_empty() {
        println!(
            "{} No image links found in {}",
            style("!").yellow(),
            input.display()
        );
        return Ok(());
    }

    let image_dir = resolve_image_dir(&settings.image_dir);
    let workers = settings.download_workers;

    println!(
        "{} Downloading {} images into {} ({} worker(s))",
        style("→").cyan(),
        jobs.len(),
        image_dir.display(),
        workers
    );

    let service = ImageDownloadService::new(
        settings.http_client()?,
        DownloadConfig {
            image_dir: image_dir.clone(),
            workers,
            overwrite,
            retry: settings.retry_policy(),
        },
    );

    // Event channel for per-image reporting
    let (event_tx, mut event_rx) = mpsc::channel::<DownloadEvent>(100);

    let event_handler = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                DownloadEvent::Started { filename, url, .. } => {
                    tracing::debug!("Fetching {} -> {}", url, filename);
                }
                DownloadEvent::Completed { path, bytes, .. } => {
                    tracing::info!("Saved {} ({} bytes)", path.display(), bytes);
                }
                DownloadEvent::Skipped { path, .. } => {
                    tracing::debug!("Kept existing {}", path.display());
                }
                DownloadEvent::Failed { url, error, .. } => {
                    eprintln!(
                        "{} Failed to download {}: {}",
                        style("✗").red(),
                        url,
                        error
                    );
                }
            }
        }
    });

    let result = service.download(jobs, event_tx).await?;

    // Wait for event handler to finish
    if let Err(e) = event_handler.await {
        tracing::warn!("Event handler task failed: {}", e);
    }

    println!(
        "{} Downloaded {} images to {}",
        style("✓").green(),
        result.downloaded,
        image_dir.display()
    );

    if result.skipped > 0 {
        println!(
            "  {} {} already present (use --overwrite to fetch again)",
            style("→").dim(),
            result.skipped
        );
    }

    if result.failed > 0 {
        println!("  {} {} failed", style("!").yellow(), result.failed);
    }

    Ok(())
}
