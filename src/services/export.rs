//! Delimited export of crawled records, and reading it back.

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::info;

use crate::error::CrawlError;
use crate::models::{EntryRecord, ExportRow, EXPORT_HEADER};

/// Field delimiter for an export path: tab for `.tsv`, comma otherwise.
pub fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    }
}

/// One row per image of every record, in identifier order.
pub fn flatten(records: &BTreeMap<String, EntryRecord>) -> Vec<ExportRow> {
    records.values().flat_map(ExportRow::from_record).collect()
}

/// Write `records` to `path`, replacing any existing file.
///
/// Returns the number of data rows written.
pub fn export_records(
    records: &BTreeMap<String, EntryRecord>,
    path: &Path,
) -> Result<usize, CrawlError> {
    let export_err = |source: csv::Error| CrawlError::Export {
        path: path.to_path_buf(),
        source,
    };

    let rows = flatten(records);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter_for(path))
        .has_headers(false)
        .from_path(path)
        .map_err(export_err)?;

    // Header goes out even when there are no rows
    writer.write_record(EXPORT_HEADER).map_err(export_err)?;
    for row in &rows {
        writer.serialize(row).map_err(export_err)?;
    }
    writer
        .flush()
        .map_err(|e| export_err(csv::Error::from(e)))?;

    info!(
        "Exported {} rows from {} records to {}",
        rows.len(),
        records.len(),
        path.display()
    );
    Ok(rows.len())
}

/// Read every row of a delimited file, matching columns to `T`'s fields by
/// header name. Columns `T` does not name are ignored.
///
/// A missing file is [`CrawlError::InputNotFound`]; anything unparsable is
/// [`CrawlError::InputInvalid`].
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, CrawlError> {
    if !path.is_file() {
        return Err(CrawlError::InputNotFound(path.to_path_buf()));
    }

    let invalid = |source: csv::Error| CrawlError::InputInvalid {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_for(path))
        .has_headers(true)
        .from_path(path)
        .map_err(invalid)?;

    reader
        .deserialize::<T>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(invalid)
}

/// Read an export file back into full rows.
pub fn read_export(path: &Path) -> Result<Vec<ExportRow>, CrawlError> {
    read_rows(path)
}
