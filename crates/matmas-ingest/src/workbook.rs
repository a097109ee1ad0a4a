//! Workbook reading via calamine.
//!
//! Worksheets are read into all-string DataFrames: headers from the first
//! row (trimmed, BOM stripped), every cell rendered to a trimmed string.

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use polars::prelude::DataFrame;

use crate::error::IngestError;
use crate::frame::{format_numeric, frame_from_columns};

/// Read the first worksheet matching one of `names` into a DataFrame.
pub fn read_sheet(path: &Path, names: &[&str]) -> Result<DataFrame, IngestError> {
    let mut workbook = open_workbook_auto(path).map_err(|error| IngestError::Workbook {
        path: path.to_path_buf(),
        message: error.to_string(),
    })?;
    for name in names {
        if let Ok(range) = workbook.worksheet_range(name) {
            return frame_from_range(&range).map_err(IngestError::from);
        }
    }
    Err(IngestError::SheetNotFound {
        path: path.to_path_buf(),
        tried: names.join("/"),
    })
}

fn frame_from_range(range: &calamine::Range<Data>) -> polars::prelude::PolarsResult<DataFrame> {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(DataFrame::empty());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| normalize_header(&cell_to_string(cell)))
        .collect();

    let mut columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (idx, slot) in columns.iter_mut().enumerate() {
            let value = row.get(idx).map(cell_to_string).unwrap_or_default();
            slot.push(value.trim().to_string());
        }
    }
    frame_from_columns(headers, columns)
}

pub(crate) fn normalize_header(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(v) => format_numeric(*v),
        Data::Int(v) => v.to_string(),
        // Dutch source flags: J/N.
        Data::Bool(b) => if *b { "J" } else { "N" }.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(parsed) => format_datetime(parsed),
            None => format_numeric(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => e.to_string(),
    }
}

fn format_datetime(value: chrono::NaiveDateTime) -> String {
    if value.time() == chrono::NaiveTime::MIN {
        value.date().format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    #[test]
    fn reads_sheet_with_trimmed_headers_and_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Artikels").unwrap();
        sheet.write_string(0, 0, " ArtikelNr ").unwrap();
        sheet.write_string(0, 1, "Naam").unwrap();
        sheet.write_string(1, 0, " A1 ").unwrap();
        sheet.write_string(1, 1, "Gauze").unwrap();
        sheet.write_number(2, 0, 42.0).unwrap();
        sheet.write_string(2, 1, "Tape").unwrap();
        workbook.save(&path).unwrap();

        let df = read_sheet(&path, &["Artikels", "Articles"]).unwrap();
        assert_eq!(
            df.get_column_names()
                .iter()
                .map(|n| n.as_str())
                .collect::<Vec<_>>(),
            vec!["ArtikelNr", "Naam"]
        );
        assert_eq!(crate::frame::column_value(&df, "ArtikelNr", 0), "A1");
        // Numeric identifiers come out without a trailing ".0".
        assert_eq!(crate::frame::column_value(&df, "ArtikelNr", 1), "42");
    }

    #[test]
    fn missing_sheet_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.xlsx");

        let mut workbook = Workbook::new();
        workbook.add_worksheet().set_name("Other").unwrap();
        workbook.save(&path).unwrap();

        let error = read_sheet(&path, &["Artikels"]).unwrap_err();
        assert!(matches!(error, IngestError::SheetNotFound { .. }));
    }
}
