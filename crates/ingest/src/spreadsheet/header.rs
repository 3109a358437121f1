use std::collections::HashSet;

use leadsync_core::Fields;

/// Build the field key for every header cell.
///
/// Non-empty cells are used trimmed and verbatim. An empty cell at 1-based
/// column `i` becomes `Column_<i>`; when that key is already taken by another
/// cell of the same row, `_2`, `_3`, … is appended until it is unique.
/// `first_column` is the 0-based sheet column of the first cell.
pub fn header_keys(cells: &[String], first_column: usize) -> Vec<String> {
    let literal: HashSet<&str> = cells
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();

    let mut synthetic: HashSet<String> = HashSet::new();
    cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let trimmed = cell.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
            let base = format!("Column_{}", first_column + i + 1);
            let mut key = base.clone();
            let mut n = 2;
            while literal.contains(key.as_str()) || synthetic.contains(&key) {
                key = format!("{base}_{n}");
                n += 1;
            }
            synthetic.insert(key.clone());
            key
        })
        .collect()
}

/// Turn data rows into field maps keyed by `keys`.
///
/// Blank rows are dropped. Short rows are padded with `""`; cells past the
/// header width are ignored. When two columns share a header, the later value
/// wins.
pub fn rows_to_fields<I>(keys: &[String], rows: I) -> Vec<Fields>
where
    I: IntoIterator<Item = Vec<String>>,
{
    rows.into_iter()
        .filter(|row| !is_blank(row))
        .map(|row| {
            let mut fields = Fields::with_capacity(keys.len());
            for (i, key) in keys.iter().enumerate() {
                let value = row.get(i).cloned().unwrap_or_default();
                fields.insert(key.clone(), value);
            }
            fields
        })
        .collect()
}

pub(crate) fn is_blank(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}
