//! Crawl command: walk the listing, extract entries, export them.

use console::style;

use crate::config::Settings;
use crate::scrapers::RendererLease;
use crate::services::{
    export_records, CrawlConfig, CrawlReport, CrawlService, SystemMemoryProbe,
};

/// Crawl the configured number of pages and write the export file.
pub async fn cmd_crawl(settings: &Settings) -> anyhow::Result<CrawlReport> {
    println!(
        "{} Crawling {} listing page(s) with the {} renderer",
        style("→").cyan(),
        settings.pages.get(),
        settings.renderer
    );

    let mut lease = RendererLease::new(settings.renderer_factory()?);
    let service = CrawlService::new(
        CrawlConfig {
            base_url: settings.base_url.clone(),
            pages: settings.pages.get(),
            wait_timeout: settings.wait_timeout(),
            retry: settings.retry_policy(),
            memory_threshold: settings.memory_threshold,
        },
        Box::new(SystemMemoryProbe::new()),
    );

    // Release the renderer whether or not the crawl succeeded
    let result = service.crawl(&mut lease).await;
    lease.release().await;
    let report = result?;

    let rows = export_records(&report.records, &settings.output)?;

    print_summary(&report, rows, settings);
    Ok(report)
}

fn print_summary(report: &CrawlReport, rows: usize, settings: &Settings) {
    let elapsed = report.finished_at - report.started_at;

    println!(
        "{} Extracted {} minerals from {} links in {}s",
        style("✓").green(),
        report.records.len(),
        report.urls_found,
        elapsed.num_seconds()
    );
    println!(
        "  {} {} rows written to {}",
        style("→").dim(),
        rows,
        settings.output.display()
    );

    if report.recycles > 0 {
        println!(
            "  {} renderer restarted {} time(s) to free memory",
            style("→").dim(),
            report.recycles
        );
    }

    if !report.skipped.is_empty() {
        println!(
            "  {} {} entries skipped for missing data:",
            style("!").yellow(),
            report.skipped.len()
        );
        for skipped in &report.skipped {
            println!("    {}", skipped.reason);
        }
    }

    for failed in &report.failed_pages {
        println!(
            "  {} listing page {} failed: {}",
            style("✗").red(),
            failed.page,
            failed.error
        );
    }

    for failed in &report.failed_entries {
        println!("  {} {} failed: {}", style("✗").red(), failed.url, failed.error);
    }
}
