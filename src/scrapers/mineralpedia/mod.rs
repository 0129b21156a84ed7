//! Scraper for the Dakota Matrix Mineralpedia encyclopedia.
//!
//! The site is a paginated listing of mineral entries. Each entry page is a
//! definition list (`dt` label, `dd` value) plus a gallery of catalog
//! thumbnails linking to full-size images.

mod extract;
mod labels;
mod listing;

pub use extract::{extract_entry, parse_entry, ExtractError};
pub use labels::{find_value_after_label, find_value_in_child};
pub use listing::{listing_url, parse_listing, walk_listing_page};

use scraper::Selector;

/// Root of the encyclopedia listing.
pub const BASE_URL: &str = "https://www.dakotamatrix.com/mineralpedia";

/// Number of listing pages the site publishes.
pub const MAX_PAGES: u32 = 293;

/// Entry links on a listing page.
pub const LISTING_SELECTOR: &str = "div.block-title h2 a";

/// Present once an entry page's attribute list has rendered.
pub const ENTRY_WAIT_SELECTOR: &str = "dt";

/// Links to full-size images on an entry page.
pub const IMAGE_SELECTOR: &str = "a.catalog-thumb";

/// Parse one of the selector constants above.
pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("built-in selector is valid")
}
