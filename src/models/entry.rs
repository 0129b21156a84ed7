//! Mineral entry model.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Attributes extracted from one Mineralpedia entry page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// Last path segment of the entry URL; unique within a crawl.
    pub identifier: String,
    pub habit: String,
    pub color: String,
    pub streak: String,
    /// Crystal class (or crystal system, depending on page layout).
    pub class: String,
    /// None when the page has no fracture attribute.
    pub fracture: Option<String>,
    /// Mean of the Mohs hardness range.
    pub hardness: f64,
    /// Image URIs in document order, duplicates preserved.
    pub images: Vec<String>,
}

/// Hardness string did not look like `n`, `n.n`, `n-n` or `n.n - n.n`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid hardness value '{0}'")]
pub struct HardnessError(pub String);

/// Parsed Mohs hardness range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hardness {
    pub low: f64,
    pub high: Option<f64>,
}

fn hardness_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\d+(?:\.\d+)?(?:\s*-\s*\d+(?:\.\d+)?)?$").expect("hardness regex is valid")
    })
}

impl Hardness {
    /// Parse an already-normalized hardness string.
    pub fn parse(value: &str) -> Result<Self, HardnessError> {
        let value = value.trim();
        if !hardness_pattern().is_match(value) {
            return Err(HardnessError(value.to_string()));
        }

        let mut tokens = value.split('-').map(|t| t.trim().parse::<f64>());
        let low = match tokens.next() {
            Some(Ok(v)) => v,
            _ => return Err(HardnessError(value.to_string())),
        };
        let high = match tokens.next() {
            Some(Ok(v)) => Some(v),
            Some(Err(_)) => return Err(HardnessError(value.to_string())),
            None => None,
        };

        Ok(Self { low, high })
    }

    /// Arithmetic mean of the range endpoints.
    pub fn mean(&self) -> f64 {
        match self.high {
            Some(high) => (self.low + high) / 2.0,
            None => self.low,
        }
    }
}
