//! Spreadsheet attachment → ordered field maps.
//!
//! Sheet choice: the second sheet when the workbook has more than one (the
//! first is usually a cover or legend sheet), otherwise the first. CSV files
//! are a single sheet. The first non-blank row is the header row.

mod header;
mod reader;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use leadsync_core::Fields;
use tracing::{info, warn};

use crate::error::NormalizeError;
use crate::scratch::remove_file_quietly;

pub use header::{header_keys, rows_to_fields};
pub use reader::{read_table, Table};

/// Read one attachment and convert its data rows into field maps.
///
/// The file is deleted after a successful read. On error it is left in
/// place for inspection; the scratch sweep removes it later.
pub fn normalize(path: &Path) -> Result<Vec<Fields>, NormalizeError> {
    let file_label = display_name(path);
    info!(file = %file_label, "parsing attachment");

    let table = read_table(path)?;
    info!(file = %file_label, sheet = %table.sheet, "reading sheet");

    let mut rows = table.rows.into_iter();
    let records = match rows.next() {
        Some(header_row) => {
            let keys = header_keys(&header_row, table.first_column);
            rows_to_fields(&keys, rows)
        }
        None => {
            info!(file = %file_label, "no data found in sheet");
            Vec::new()
        }
    };

    info!(file = %file_label, rows = records.len(), "parsed attachment");
    remove_file_quietly(path);
    Ok(records)
}

/// Normalize each path in order and concatenate the results.
///
/// A failing file is logged and skipped; it never aborts the batch.
pub fn normalize_all<P: AsRef<Path>>(paths: &[P]) -> Vec<Fields> {
    let mut all = Vec::new();
    for path in paths {
        let path = path.as_ref();
        match normalize(path) {
            Ok(records) => all.extend(records),
            Err(e) => warn!(file = %display_name(path), error = %e, "failed to parse attachment"),
        }
    }
    all
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| PathBuf::from(path).display().to_string())
}
