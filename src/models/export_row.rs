//! Flattened export row: one per (entry, image) pair.

use serde::{Deserialize, Serialize};

use super::EntryRecord;
use crate::utils::last_path_segment;

/// Column order of the export file.
pub const EXPORT_HEADER: [&str; 9] = [
    "name",
    "habit",
    "color",
    "streak",
    "class",
    "fracture",
    "hardness",
    "image_uri",
    "image_name",
];

/// One row of the export file.
///
/// Field order matches `EXPORT_HEADER`, which the exporter writes ahead of
/// the rows; the reader matches columns by these names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub name: String,
    pub habit: String,
    pub color: String,
    pub streak: String,
    #[serde(rename = "class")]
    pub class_type: String,
    pub fracture: Option<String>,
    pub hardness: f64,
    pub image_uri: String,
    pub image_name: String,
}

impl ExportRow {
    /// Rows for one record, one per image. Empty when the record has no images.
    pub fn from_record(record: &EntryRecord) -> Vec<Self> {
        record
            .images
            .iter()
            .map(|uri| Self {
                name: record.identifier.clone(),
                habit: record.habit.clone(),
                color: record.color.clone(),
                streak: record.streak.clone(),
                class_type: record.class.clone(),
                fracture: record.fracture.clone(),
                hardness: record.hardness,
                image_uri: uri.clone(),
                image_name: last_path_segment(uri).unwrap_or_else(|| record.identifier.clone()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(images: &[&str]) -> EntryRecord {
        EntryRecord {
            identifier: "quartz".into(),
            habit: "Prismatic".into(),
            color: "Colorless".into(),
            streak: "White".into(),
            class: "Silicates".into(),
            fracture: None,
            hardness: 7.0,
            images: images.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_one_row_per_image() {
        let rows = ExportRow::from_record(&record(&[
            "https://img.example.com/q/1.jpg",
            "https://img.example.com/q/2.jpg",
        ]));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].image_name, "1.jpg");
        assert_eq!(rows[1].image_name, "2.jpg");
        assert_eq!(rows[0].name, rows[1].name);
        assert_eq!(rows[0].hardness, rows[1].hardness);
    }

    #[test]
    fn test_no_images_no_rows() {
        assert!(ExportRow::from_record(&record(&[])).is_empty());
    }

    #[test]
    fn test_duplicate_images_preserved() {
        let uri = "https://img.example.com/q/1.jpg";
        assert_eq!(ExportRow::from_record(&record(&[uri, uri])).len(), 2);
    }
}
