use std::path::Path;

use calamine::{open_workbook_auto, Data, DataType, Reader};
use chrono::{NaiveDateTime, NaiveTime};
use leadsync_core::tabular::extension_of;

use crate::error::NormalizeError;

use super::header::is_blank;

/// Cell text of the chosen sheet, starting at its first non-blank row.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Sheet name (`"csv"` for CSV files).
    pub sheet: String,
    /// 0-based sheet column of the first cell in every row.
    pub first_column: usize,
    pub rows: Vec<Vec<String>>,
}

/// Read the preferred sheet of a workbook or CSV file as text rows.
pub fn read_table(path: &Path) -> Result<Table, NormalizeError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match extension_of(&name).as_deref() {
        Some("csv") => read_csv(path),
        Some("xlsx") | Some("xlsm") | Some("xlsb") | Some("xls") | Some("ods") => {
            read_workbook(path)
        }
        Some(other) => Err(NormalizeError::UnsupportedType(other.to_string())),
        None => Err(NormalizeError::UnsupportedType(name)),
    }
}

fn read_workbook(path: &Path) -> Result<Table, NormalizeError> {
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names();
    let sheet = names
        .get(1)
        .or_else(|| names.first())
        .cloned()
        .ok_or(NormalizeError::NoSheets)?;

    let range = workbook.worksheet_range(&sheet)?;
    let first_column = range.start().map(|(_, col)| col as usize).unwrap_or(0);
    let rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>());

    Ok(Table {
        sheet,
        first_column,
        rows: skip_leading_blank(rows),
    })
}

fn read_csv(path: &Path) -> Result<Table, NormalizeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(String::from).collect::<Vec<_>>());
    }

    Ok(Table {
        sheet: "csv".to_string(),
        first_column: 0,
        rows: skip_leading_blank(rows),
    })
}

fn skip_leading_blank<I>(rows: I) -> Vec<Vec<String>>
where
    I: IntoIterator<Item = Vec<String>>,
{
    rows.into_iter().skip_while(|row| is_blank(row)).collect()
}

/// Cell value as displayed text. Dates and times render in ISO form, booleans in upper case.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::DateTime(dt) if dt.is_datetime() && dt.as_f64() < 1.0 => cell
            .as_time()
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| cell.to_string()),
        Data::DateTime(dt) if dt.is_datetime() => date_text(cell),
        Data::DateTimeIso(_) => date_text(cell),
        other => other.to_string(),
    }
}

fn date_text(cell: &Data) -> String {
    cell.as_datetime()
        .map(format_datetime)
        .or_else(|| cell.as_date().map(|d| d.format("%Y-%m-%d").to_string()))
        .unwrap_or_else(|| cell.to_string())
}

fn format_datetime(dt: NaiveDateTime) -> String {
    if dt.time() == NaiveTime::MIN {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
