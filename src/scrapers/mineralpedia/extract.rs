//! Field extraction from a rendered entry page.

use std::time::Duration;

use scraper::Html;

use super::{find_value_after_label, find_value_in_child, selector};
use super::{ENTRY_WAIT_SELECTOR, IMAGE_SELECTOR};
use crate::models::{EntryRecord, Hardness, HardnessError};
use crate::scrapers::{PageRenderer, RenderError};
use crate::utils::{last_path_segment, resolve_href};

const HABIT_LABEL: &str = "Crystal Habit";
const COLOR_LABEL: &str = "Color";
const STREAK_LABEL: &str = "Streak";
const CLASS_LABELS: [&str; 2] = ["Class", "Crystal System"];
const HARDNESS_LABEL: &str = "Hardness";
const FRACTURE_LABEL: &str = "Fracture";

/// Why an entry produced no record.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("missing required field '{field}' on {url}")]
    MissingField { field: &'static str, url: String },

    #[error("unusable hardness on {url}: {source}")]
    InvalidHardness {
        url: String,
        #[source]
        source: HardnessError,
    },

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl ExtractError {
    /// The page rendered but lacks usable data; retrying will not help.
    pub fn is_skip(&self) -> bool {
        !matches!(self, ExtractError::Render(_))
    }

    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExtractError::Render(e) => e.is_retryable(),
            _ => false,
        }
    }
}

fn required(value: Option<String>, field: &'static str, url: &str) -> Result<String, ExtractError> {
    value.ok_or_else(|| ExtractError::MissingField {
        field,
        url: url.to_string(),
    })
}

/// Build an `EntryRecord` from an entry page's HTML.
///
/// `url` names the entry (its last path segment is the identifier) and is the
/// base for relative image links.
pub fn parse_entry(html: &str, url: &str) -> Result<EntryRecord, ExtractError> {
    let identifier = required(last_path_segment(url), "identifier", url)?;
    let document = Html::parse_document(html);

    let habit = required(find_value_after_label(&document, HABIT_LABEL), "habit", url)?;
    let color = required(find_value_after_label(&document, COLOR_LABEL), "color", url)?;
    let streak = required(find_value_after_label(&document, STREAK_LABEL), "streak", url)?;
    let class = required(
        CLASS_LABELS
            .iter()
            .find_map(|label| find_value_after_label(&document, label)),
        "class",
        url,
    )?;

    let span = selector("span");
    let raw_hardness = required(
        find_value_in_child(&document, HARDNESS_LABEL, &span),
        "hardness",
        url,
    )?;
    let hardness = Hardness::parse(&raw_hardness)
        .map_err(|source| ExtractError::InvalidHardness {
            url: url.to_string(),
            source,
        })?
        .mean();

    let fracture = find_value_after_label(&document, FRACTURE_LABEL);

    let thumbs = selector(IMAGE_SELECTOR);
    let images = document
        .select(&thumbs)
        .filter_map(|el| el.value().attr("href"))
        .map(|href| resolve_href(url, href.trim()))
        .collect();

    Ok(EntryRecord {
        identifier,
        habit,
        color,
        streak,
        class,
        fracture,
        hardness,
        images,
    })
}

/// Render an entry page and extract its record.
pub async fn extract_entry(
    renderer: &dyn PageRenderer,
    url: &str,
    timeout: Duration,
) -> Result<EntryRecord, ExtractError> {
    let page = renderer.render(url, ENTRY_WAIT_SELECTOR, timeout).await?;
    parse_entry(&page.html, url)
}
