//! Listing pages: `<base>?page=N` holds links to the entries on that page.

use std::time::Duration;

use scraper::Html;
use tracing::debug;

use super::{selector, LISTING_SELECTOR};
use crate::scrapers::{PageRenderer, RenderError};
use crate::utils::resolve_href;

/// URL of listing page `page` (1-based).
pub fn listing_url(base_url: &str, page: u32) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{}{}page={}", base_url, separator, page)
}

/// Entry links on a rendered listing page, in document order.
pub fn parse_listing(html: &str, page_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let links = selector(LISTING_SELECTOR);

    document
        .select(&links)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
        .map(|href| resolve_href(page_url, href))
        .collect()
}

/// Render listing page `page` and return its entry links.
pub async fn walk_listing_page(
    renderer: &dyn PageRenderer,
    base_url: &str,
    page: u32,
    timeout: Duration,
) -> Result<Vec<String>, RenderError> {
    let url = listing_url(base_url, page);
    let rendered = renderer.render(&url, LISTING_SELECTOR, timeout).await?;
    let urls = parse_listing(&rendered.html, &rendered.final_url);
    debug!("Listing page {} has {} entries", page, urls.len());
    Ok(urls)
}
