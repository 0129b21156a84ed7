//! Crawl orchestration.
//!
//! Phase A walks the listing pages into an ordered list of entry URLs.
//! Phase B renders every entry and extracts its record, recycling the
//! renderer when host memory usage crosses the configured threshold.
//! Per-item failures are collected into the report; only an unusable
//! renderer ends the crawl early.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::CrawlError;
use crate::models::EntryRecord;
use crate::scrapers::mineralpedia::{extract_entry, walk_listing_page, ExtractError};
use crate::scrapers::{RenderError, RendererLease};
use crate::services::resources::ResourceProbe;
use crate::utils::{with_retry, RetryPolicy};

/// Parameters for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub base_url: String,
    /// Listing pages to walk, starting at 1.
    pub pages: u32,
    /// Bound on each wait for page elements.
    pub wait_timeout: Duration,
    pub retry: RetryPolicy,
    /// Used-memory percentage above which the renderer is recycled.
    pub memory_threshold: f64,
}

/// Entry that rendered but lacked usable data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub url: String,
    pub reason: String,
}

/// Listing page that could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPage {
    pub page: u32,
    pub error: String,
}

/// Entry page that could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEntry {
    pub url: String,
    pub error: String,
}

/// Outcome of a crawl.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Extracted records keyed by identifier.
    pub records: BTreeMap<String, EntryRecord>,
    /// Entry URLs found in Phase A, duplicates included.
    pub urls_found: usize,
    pub skipped: Vec<SkippedEntry>,
    pub failed_pages: Vec<FailedPage>,
    pub failed_entries: Vec<FailedEntry>,
    /// Times the renderer was torn down and rebuilt.
    pub recycles: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CrawlReport {
    /// Number of export rows the records will produce.
    pub fn image_count(&self) -> usize {
        self.records.values().map(|r| r.images.len()).sum()
    }
}

/// Result of Phase B.
struct Extraction {
    records: BTreeMap<String, EntryRecord>,
    skipped: Vec<SkippedEntry>,
    failed: Vec<FailedEntry>,
    recycles: u32,
}

/// Drives a crawl over a leased renderer.
pub struct CrawlService {
    config: CrawlConfig,
    probe: Box<dyn ResourceProbe>,
}

impl CrawlService {
    pub fn new(config: CrawlConfig, probe: Box<dyn ResourceProbe>) -> Self {
        Self { config, probe }
    }

    /// Run both phases.
    ///
    /// The lease stays with the caller, which releases it afterwards.
    pub async fn crawl(&self, lease: &mut RendererLease) -> Result<CrawlReport, CrawlError> {
        let started_at = Utc::now();
        info!(
            "Crawling {} listing page(s) of {} with the {} renderer",
            self.config.pages,
            self.config.base_url,
            lease.renderer().name()
        );

        let (urls, failed_pages) = self.collect_entry_urls(lease).await?;
        info!("Found {} entry links", urls.len());

        let extraction = self.extract_entries(lease, &urls).await?;

        let report = CrawlReport {
            records: extraction.records,
            urls_found: urls.len(),
            skipped: extraction.skipped,
            failed_pages,
            failed_entries: extraction.failed,
            recycles: extraction.recycles,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "Crawl finished: {} records, {} skipped, {} failed pages, {} failed entries, {} recycles",
            report.records.len(),
            report.skipped.len(),
            report.failed_pages.len(),
            report.failed_entries.len(),
            report.recycles
        );
        Ok(report)
    }

    /// Phase A: entry URLs of pages `1..=pages`, in page order.
    async fn collect_entry_urls(
        &self,
        lease: &RendererLease,
    ) -> Result<(Vec<String>, Vec<FailedPage>), CrawlError> {
        let renderer = lease.renderer();
        let mut urls = Vec::new();
        let mut failed_pages = Vec::new();

        for page in 1..=self.config.pages {
            let what = format!("Listing page {}", page);
            let result = with_retry(
                &self.config.retry,
                &what,
                || {
                    walk_listing_page(
                        renderer,
                        &self.config.base_url,
                        page,
                        self.config.wait_timeout,
                    )
                },
                RenderError::is_retryable,
            )
            .instrument(info_span!("listing", page))
            .await;

            match result {
                Ok(found) => urls.extend(found),
                Err(e @ RenderError::Launch(_)) => return Err(e.into()),
                Err(e) => {
                    warn!("Giving up on listing page {}: {}", page, e);
                    failed_pages.push(FailedPage {
                        page,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok((urls, failed_pages))
    }

    /// Recycle the renderer if memory usage is above the threshold.
    async fn relieve_memory_pressure(&self, lease: &mut RendererLease) -> bool {
        match self.probe.memory_percent() {
            Some(used) if used > self.config.memory_threshold => {
                info!(
                    "Memory usage {:.1}% exceeds {:.1}%, recycling renderer",
                    used, self.config.memory_threshold
                );
                lease.recycle().await;
                true
            }
            Some(used) => {
                debug!("Memory usage {:.1}%", used);
                false
            }
            None => false,
        }
    }

    /// Phase B: extract every URL, last write wins per identifier.
    async fn extract_entries(
        &self,
        lease: &mut RendererLease,
        urls: &[String],
    ) -> Result<Extraction, CrawlError> {
        let mut extraction = Extraction {
            records: BTreeMap::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            recycles: 0,
        };

        for (index, url) in urls.iter().enumerate() {
            if self.relieve_memory_pressure(lease).await {
                extraction.recycles += 1;
            }

            let renderer = lease.renderer();
            let span = info_span!("entry", url = %url);
            let result = with_retry(
                &self.config.retry,
                url,
                || extract_entry(renderer, url, self.config.wait_timeout),
                ExtractError::is_retryable,
            )
            .instrument(span)
            .await;

            match result {
                Ok(record) => {
                    debug!("[{}/{}] extracted {}", index + 1, urls.len(), record.identifier);
                    if let Some(previous) =
                        extraction.records.insert(record.identifier.clone(), record)
                    {
                        debug!("Replaced earlier record for {}", previous.identifier);
                    }
                }
                Err(ExtractError::Render(e @ RenderError::Launch(_))) => return Err(e.into()),
                Err(e) if e.is_skip() => {
                    info!("Skipping entry: {}", e);
                    extraction.skipped.push(SkippedEntry {
                        url: url.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Giving up on entry: {}", e);
                    extraction.failed.push(FailedEntry {
                        url: url.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::{PageRenderer, RenderedPage, RendererFactory};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const BASE: &str = "https://minerals.test/mineralpedia";

    /// Serves canned HTML; unknown URLs time out.
    struct FixtureRenderer {
        pages: Arc<HashMap<String, String>>,
        launch_error: bool,
    }

    #[async_trait]
    impl PageRenderer for FixtureRenderer {
        async fn render(
            &self,
            url: &str,
            wait_for: &str,
            timeout: Duration,
        ) -> Result<RenderedPage, RenderError> {
            if self.launch_error {
                return Err(RenderError::Launch("no browser".into()));
            }
            match self.pages.get(url) {
                Some(html) => Ok(RenderedPage {
                    url: url.to_string(),
                    final_url: url.to_string(),
                    html: html.clone(),
                }),
                None => Err(RenderError::WaitTimeout {
                    url: url.to_string(),
                    selector: wait_for.to_string(),
                    timeout,
                }),
            }
        }

        async fn shutdown(&self) {}

        fn name(&self) -> &'static str {
            "fixture"
        }
    }

    /// Reports a fixed memory usage.
    struct FixedProbe(Option<f64>);

    impl ResourceProbe for FixedProbe {
        fn memory_percent(&self) -> Option<f64> {
            self.0
        }
    }

    fn listing(hrefs: &[&str]) -> String {
        hrefs
            .iter()
            .map(|h| format!("<div class='block-title'><h2><a href='{}'>x</a></h2></div>", h))
            .collect()
    }

    fn entry(color: &str, hardness: &str, images: &[&str]) -> String {
        let mut html = format!(
            "<dl><dt>Crystal Habit</dt><dd>Prismatic</dd>\
             <dt>Color</dt><dd>{}</dd>\
             <dt>Streak</dt><dd>White</dd>\
             <dt>Class</dt><dd>Silicates</dd>\
             <dt>Hardness</dt><dd><span>{}</span></dd></dl>",
            color, hardness
        );
        for img in images {
            html.push_str(&format!("<a class='catalog-thumb' href='{}'></a>", img));
        }
        html
    }

    fn fixture_pages() -> HashMap<String, String> {
        let mut pages = HashMap::new();
        pages.insert(
            format!("{}?page=1", BASE),
            listing(&["/mineralpedia/detail/1/quartz", "/mineralpedia/detail/2/broken"]),
        );
        pages.insert(
            format!("{}?page=2", BASE),
            listing(&["/mineralpedia/detail/3/calcite", "/mineralpedia/other/quartz"]),
        );
        // page 3 is absent and will time out
        pages.insert(
            "https://minerals.test/mineralpedia/detail/1/quartz".into(),
            entry("Colorless", "7", &["/img/q1.jpg", "/img/q2.jpg"]),
        );
        pages.insert(
            "https://minerals.test/mineralpedia/detail/2/broken".into(),
            "<dl><dt>Color</dt><dd>Red</dd></dl>".into(),
        );
        pages.insert(
            "https://minerals.test/mineralpedia/detail/3/calcite".into(),
            entry("White", "3", &["/img/c1.jpg"]),
        );
        pages.insert(
            "https://minerals.test/mineralpedia/other/quartz".into(),
            entry("Smoky", "7", &["/img/q3.jpg"]),
        );
        pages
    }

    fn fixture_lease(pages: HashMap<String, String>, launch_error: bool) -> (RendererLease, Arc<AtomicUsize>) {
        let pages = Arc::new(pages);
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let factory: RendererFactory = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::new(FixtureRenderer {
                pages: pages.clone(),
                launch_error,
            })
        });
        (RendererLease::new(factory), created)
    }

    fn config(pages: u32) -> CrawlConfig {
        CrawlConfig {
            base_url: BASE.to_string(),
            pages,
            wait_timeout: Duration::from_millis(50),
            retry: RetryPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
            memory_threshold: 80.0,
        }
    }

    #[tokio::test]
    async fn test_crawl_collects_records_and_failures() {
        let (mut lease, _) = fixture_lease(fixture_pages(), false);
        let service = CrawlService::new(config(3), Box::new(FixedProbe(None)));

        let report = service.crawl(&mut lease).await.unwrap();

        assert_eq!(report.urls_found, 4);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.failed_pages.len(), 1);
        assert_eq!(report.failed_pages[0].page, 3);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].url.ends_with("/broken"));
        assert!(report.failed_entries.is_empty());
        assert_eq!(report.recycles, 0);
        assert!(report.finished_at >= report.started_at);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let (mut lease, _) = fixture_lease(fixture_pages(), false);
        let service = CrawlService::new(config(2), Box::new(FixedProbe(None)));

        let report = service.crawl(&mut lease).await.unwrap();

        let quartz = &report.records["quartz"];
        assert_eq!(quartz.color, "Smoky");
        assert_eq!(quartz.images, vec!["https://minerals.test/img/q3.jpg"]);
        assert_eq!(report.image_count(), 2);
    }

    #[tokio::test]
    async fn test_recycles_under_memory_pressure() {
        let (mut lease, created) = fixture_lease(fixture_pages(), false);
        let service = CrawlService::new(config(1), Box::new(FixedProbe(Some(93.5))));

        let report = service.crawl(&mut lease).await.unwrap();

        // one recycle before each of the two entries on page 1
        assert_eq!(report.recycles, 2);
        assert_eq!(lease.generation(), 2);
        assert_eq!(created.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_below_threshold_does_not_recycle() {
        let (mut lease, _) = fixture_lease(fixture_pages(), false);
        let service = CrawlService::new(config(1), Box::new(FixedProbe(Some(80.0))));
        let report = service.crawl(&mut lease).await.unwrap();
        assert_eq!(report.recycles, 0);
    }

    #[tokio::test]
    async fn test_entry_failures_are_recorded() {
        let mut pages = fixture_pages();
        pages.remove("https://minerals.test/mineralpedia/detail/3/calcite");
        let (mut lease, _) = fixture_lease(pages, false);
        let service = CrawlService::new(config(2), Box::new(FixedProbe(None)));

        let report = service.crawl(&mut lease).await.unwrap();

        assert_eq!(report.failed_entries.len(), 1);
        assert!(report.failed_entries[0].url.ends_with("/calcite"));
        assert!(!report.records.contains_key("calcite"));
    }

    #[tokio::test]
    async fn test_launch_failure_aborts() {
        let (mut lease, _) = fixture_lease(fixture_pages(), true);
        let service = CrawlService::new(config(2), Box::new(FixedProbe(None)));

        let err = service.crawl(&mut lease).await.unwrap_err();
        assert!(matches!(err, CrawlError::Renderer(RenderError::Launch(_))));
        assert_eq!(err.exit_code(), 3);
    }
}
