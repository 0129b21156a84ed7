//! Label/value lookup over definition lists.

use scraper::{ElementRef, Html, Selector};

use super::selector;
use crate::utils::normalize_text;

/// Normalized visible text of an element.
fn element_text(element: ElementRef<'_>) -> String {
    normalize_text(&element.text().collect::<String>())
}

/// Whether `text` begins with `label` as a whole word, so "Hardness:" and
/// "Streak (powder)" match while "Streak Color" never matches "Color".
fn leads_with(text: &str, label: &str) -> bool {
    text.strip_prefix(label)
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric()))
}

/// Find the `dt` whose text is `label`, falling back to the first `dt`
/// that leads with it.
fn find_label<'a>(document: &'a Html, label: &str) -> Option<ElementRef<'a>> {
    let dt = selector("dt");
    let labels: Vec<(ElementRef<'a>, String)> = document
        .select(&dt)
        .map(|el| (el, element_text(el)))
        .collect();

    labels
        .iter()
        .find(|(_, text)| text == label)
        .or_else(|| labels.iter().find(|(_, text)| leads_with(text, label)))
        .map(|(el, _)| *el)
}

/// The first `dd` sibling after the label.
fn value_node<'a>(document: &'a Html, label: &str) -> Option<ElementRef<'a>> {
    find_label(document, label)?
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "dd")
}

/// Return the normalized text of the value paired with `label`.
///
/// `None` when no label matches, the label has no `dd` sibling, or the value
/// is empty after normalization.
pub fn find_value_after_label(document: &Html, label: &str) -> Option<String> {
    let text = element_text(value_node(document, label)?);
    (!text.is_empty()).then_some(text)
}

/// Like [`find_value_after_label`], but reads the first element matching
/// `child` inside the value node.
pub fn find_value_in_child(document: &Html, label: &str, child: &Selector) -> Option<String> {
    let inner = value_node(document, label)?.select(child).next()?;
    let text = element_text(inner);
    (!text.is_empty()).then_some(text)
}
