//! Tests for spreadsheet normalization.

use std::fs;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

use super::{header_keys, normalize, normalize_all, rows_to_fields};
use crate::error::NormalizeError;

fn cells(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Write a workbook where each sheet is a grid of optional string cells.
fn write_xlsx(path: &Path, sheets: &[(&str, Vec<Vec<Option<&str>>>)]) {
    let mut workbook = Workbook::new();
    for (name, grid) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name).unwrap();
        for (r, row) in grid.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if let Some(text) = cell {
                    sheet.write_string(r as u32, c as u16, *text).unwrap();
                }
            }
        }
    }
    workbook.save(path).unwrap();
}

fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

// -- header synthesis ---------------------------------------------------

#[test]
fn blank_header_cells_get_positional_keys() {
    let keys = header_keys(&cells(&["Name", "", "Phone", " "]), 0);
    assert_eq!(keys, vec!["Name", "Column_2", "Phone", "Column_4"]);
}

#[test]
fn duplicate_blank_cells_never_collide() {
    let keys = header_keys(&cells(&["", "", ""]), 0);
    assert_eq!(keys, vec!["Column_1", "Column_2", "Column_3"]);
}

#[test]
fn synthetic_key_avoids_literal_header_with_same_text() {
    let keys = header_keys(&cells(&["Column_2", ""]), 0);
    assert_eq!(keys, vec!["Column_2", "Column_2_2"]);
}

#[test]
fn header_text_is_trimmed() {
    let keys = header_keys(&cells(&["  Name ", "\tCity"]), 0);
    assert_eq!(keys, vec!["Name", "City"]);
}

#[test]
fn synthetic_keys_use_sheet_column_offset() {
    let keys = header_keys(&cells(&["Name", ""]), 2);
    assert_eq!(keys, vec!["Name", "Column_4"]);
}

#[test]
fn header_keys_are_deterministic() {
    let row = cells(&["A", "", "B", ""]);
    assert_eq!(header_keys(&row, 0), header_keys(&row, 0));
}

// -- row mapping --------------------------------------------------------

#[test]
fn missing_cells_default_to_empty_string() {
    let keys = cells(&["Name", "Phone", "City"]);
    let records = rows_to_fields(&keys, vec![cells(&["Asha"])]);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["Name"], "Asha");
    assert_eq!(records[0]["Phone"], "");
    assert_eq!(records[0]["City"], "");
}

#[test]
fn blank_rows_are_dropped_and_extra_cells_ignored() {
    let keys = cells(&["Name"]);
    let records = rows_to_fields(
        &keys,
        vec![cells(&["", "  "]), cells(&["Ravi", "extra"]), cells(&[])],
    );
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].len(), 1);
    assert_eq!(records[0]["Name"], "Ravi");
}

#[test]
fn field_order_follows_header_order() {
    let keys = cells(&["Zeta", "Alpha", "Mid"]);
    let records = rows_to_fields(&keys, vec![cells(&["1", "2", "3"])]);
    let order: Vec<&str> = records[0].keys().map(String::as_str).collect();
    assert_eq!(order, vec!["Zeta", "Alpha", "Mid"]);
}

// -- normalize ----------------------------------------------------------

#[test]
fn normalize_csv_and_delete_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        "leads.csv",
        "Name,,Phone\n\nAsha,Pune,98200\nRavi,,\n,,\n",
    );

    let records = normalize(&path).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["Name"], "Asha");
    assert_eq!(records[0]["Column_2"], "Pune");
    assert_eq!(records[1]["Phone"], "");
    assert!(!path.exists(), "source file should be deleted after a successful read");
}

#[test]
fn normalize_prefers_second_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.xlsx");
    write_xlsx(
        &path,
        &[
            ("Legend", vec![vec![Some("Read me")], vec![Some("ignored")]]),
            (
                "Leads",
                vec![
                    vec![Some("Name"), None, Some("Phone")],
                    vec![Some("Asha"), Some("x"), Some("1")],
                    vec![Some("Ravi"), None, Some("2")],
                ],
            ),
        ],
    );

    let records = normalize(&path).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["Name"], "Asha");
    assert_eq!(records[0]["Column_2"], "x");
    assert_eq!(records[1]["Column_2"], "");
    assert!(!path.exists());
}

#[test]
fn normalize_single_sheet_workbook_uses_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("single.xlsx");
    write_xlsx(
        &path,
        &[(
            "Sheet1",
            vec![
                vec![Some("Email")],
                vec![Some("a@example.com")],
                vec![Some("b@example.com")],
                vec![Some("c@example.com")],
            ],
        )],
    );

    let records = normalize(&path).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[2]["Email"], "c@example.com");
}

#[test]
fn typed_cells_read_as_display_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("typed.xlsx");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in ["Date", "Received", "Amount", "Flag"].iter().enumerate() {
        sheet.write_string(0, col as u16, *header).unwrap();
    }
    let day = ExcelDateTime::from_ymd(2025, 10, 19).unwrap();
    let stamp = ExcelDateTime::from_ymd(2025, 10, 19)
        .unwrap()
        .and_hms(14, 30, 5)
        .unwrap();
    sheet
        .write_datetime_with_format(1, 0, &day, &Format::new().set_num_format("dd/mm/yyyy"))
        .unwrap();
    sheet
        .write_datetime_with_format(1, 1, &stamp, &Format::new().set_num_format("dd/mm/yyyy hh:mm:ss"))
        .unwrap();
    sheet.write_number(1, 2, 1500).unwrap();
    sheet.write_boolean(1, 3, true).unwrap();
    sheet.write_boolean(2, 3, false).unwrap();
    workbook.save(&path).unwrap();

    let records = normalize(&path).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["Date"], "2025-10-19");
    assert_eq!(records[0]["Received"], "2025-10-19 14:30:05");
    assert_eq!(records[0]["Amount"], "1500");
    assert_eq!(records[0]["Flag"], "TRUE");
    assert_eq!(records[1]["Flag"], "FALSE");
}

#[test]
fn normalize_header_only_sheet_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "empty.csv", "Name,Phone\n");
    assert!(normalize(&path).unwrap().is_empty());
}

#[test]
fn normalize_unsupported_type_keeps_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "notes.txt", "hello");
    let err = normalize(&path).unwrap_err();
    assert!(matches!(err, NormalizeError::UnsupportedType(_)), "got: {err:?}");
    assert!(path.exists(), "failed files stay for inspection");
}

#[test]
fn normalize_corrupt_workbook_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "broken.xlsx", "this is not a zip archive");
    assert!(normalize(&path).is_err());
    assert!(path.exists());
}

// -- normalize_all ------------------------------------------------------

#[test]
fn normalize_all_skips_failing_file() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_csv(dir.path(), "1.csv", "Name\nA\nB\n");
    let second = write_csv(dir.path(), "2.xlsx", "garbage");
    let third = write_csv(dir.path(), "3.csv", "Name\nC\n");

    let records = normalize_all(&[first.clone(), second.clone(), third.clone()]);
    let names: Vec<&str> = records.iter().map(|r| r["Name"].as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);
    assert!(!first.exists());
    assert!(second.exists());
    assert!(!third.exists());
}

#[test]
fn normalize_all_empty_input() {
    let paths: Vec<PathBuf> = Vec::new();
    assert!(normalize_all(&paths).is_empty());
}
