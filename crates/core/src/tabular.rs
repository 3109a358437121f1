//! Attachment file types the normalizer can read.

/// Extensions (lowercase, no dot) of spreadsheet formats that are ingested.
pub const TABULAR_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods", "csv"];

/// Whether `file_name` has a recognized spreadsheet extension (case-insensitive).
pub fn is_tabular(file_name: &str) -> bool {
    extension_of(file_name)
        .map(|ext| TABULAR_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Lowercased extension after the last dot, if any.
pub fn extension_of(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
