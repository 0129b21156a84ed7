//! Text normalization for scraped values.

/// Normalize a scraped value.
///
/// Non-breaking spaces are removed outright (not turned into spaces), runs of
/// other whitespace collapse to a single space, and the ends are trimmed.
pub fn normalize_text(raw: &str) -> String {
    raw.replace('\u{a0}', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
