//! Service layer for crawling, exporting and image download.
//!
//! This module contains domain logic separated from UI concerns.
//! Services report through tracing and return summaries for the CLI to print.

pub mod crawl;
pub mod download;
pub mod export;
pub mod resources;

pub use crawl::{CrawlConfig, CrawlReport, CrawlService, FailedEntry, FailedPage, SkippedEntry};
pub use download::{
    jobs_from_export, DownloadConfig, DownloadEvent, DownloadFailure, DownloadResult,
    ImageDownloadService, ImageJob,
};
pub use export::{export_records, flatten, read_export};
pub use resources::{NoopProbe, ResourceProbe, SystemMemoryProbe};
