//! Data models for crawled mineral entries and their exported rows.

mod entry;
mod export_row;

pub use entry::{EntryRecord, Hardness, HardnessError};
pub use export_row::{ExportRow, EXPORT_HEADER};
