//! Import template alignment.
//!
//! The SAP import template carries its column list in a fixed header row.
//! The final output frame is reindexed to exactly that list: template
//! columns the rules never produced come out empty, generated columns the
//! template does not know are dropped, and the site code column is always
//! forced to the run's site code.

use std::path::Path;

use anyhow::{Context, Result, bail};
use calamine::{Data, Reader, open_workbook_auto};
use polars::prelude::{Column, DataFrame};
use tracing::warn;

use matmas_ingest::column_value;
use matmas_model::columns::SITE_CODE_COLUMN;

/// Zero-based row of the template sheet holding the column headers.
const TEMPLATE_HEADER_ROW: u32 = 4;

/// Read the ordered column list from the template workbook's first sheet.
pub fn template_columns(path: &Path) -> Result<Vec<String>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("cannot open template {}", path.display()))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .with_context(|| format!("template {} has no sheets", path.display()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("cannot read template sheet '{sheet}'"))?;

    let start_row = range.start().map(|(row, _)| row).unwrap_or(0);
    if TEMPLATE_HEADER_ROW < start_row {
        bail!("template header row is above the sheet's data range");
    }
    let Some(header) = range.rows().nth((TEMPLATE_HEADER_ROW - start_row) as usize) else {
        bail!("template sheet '{sheet}' has no header row");
    };

    let mut columns = Vec::new();
    for cell in header {
        if let Data::String(text) = cell {
            let trimmed = text.trim();
            if !trimmed.is_empty() && !columns.iter().any(|c| c == trimmed) {
                columns.push(trimmed.to_string());
            }
        }
    }
    if columns.is_empty() {
        bail!("template sheet '{sheet}' header row holds no column names");
    }
    Ok(columns)
}

/// Reindex `output` to the template's column list.
///
/// Template problems are not fatal for a conversion run: on any error the
/// output is returned unaligned with a warning.
pub fn align_to_template(output: DataFrame, template_path: &Path, site_code: &str) -> DataFrame {
    let columns = match template_columns(template_path) {
        Ok(columns) => columns,
        Err(error) => {
            warn!(
                template = %template_path.display(),
                error = %format!("{error:#}"),
                "template unavailable, emitting unaligned output"
            );
            return output;
        }
    };
    match reindex(&output, &columns, site_code) {
        Ok(aligned) => aligned,
        Err(error) => {
            warn!(%error, "template alignment failed, emitting unaligned output");
            output
        }
    }
}

fn reindex(output: &DataFrame, template: &[String], site_code: &str) -> Result<DataFrame> {
    let height = output.height();
    let mut columns = Vec::with_capacity(template.len());
    for name in template {
        let values: Vec<String> = if name == SITE_CODE_COLUMN {
            vec![site_code.to_string(); height]
        } else if output.column(name).is_ok() {
            (0..height).map(|idx| column_value(output, name, idx)).collect()
        } else {
            vec![String::new(); height]
        };
        columns.push(Column::new(name.as_str().into(), values));
    }
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use matmas_ingest::frame_from_columns;
    use rust_xlsxwriter::Workbook;

    fn write_template(path: &Path, headers: &[&str]) {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "MATMAS import template").unwrap();
        for (col, header) in headers.iter().enumerate() {
            sheet
                .write_string(TEMPLATE_HEADER_ROW, col as u16, *header)
                .unwrap();
        }
        workbook.save(path).unwrap();
    }

    fn output_df() -> DataFrame {
        frame_from_columns(
            vec![
                "MATNR".to_string(),
                "MAKTX".to_string(),
                "EXTRA".to_string(),
            ],
            vec![
                vec!["A1".to_string(), "A2".to_string()],
                vec!["Gauze".to_string(), "Syringe".to_string()],
                vec!["x".to_string(), "y".to_string()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn reads_header_row_from_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.xlsx");
        write_template(&path, &["MATNR", "MAKTX", "WERKS", "MEINS"]);
        let columns = template_columns(&path).unwrap();
        assert_eq!(columns, vec!["MATNR", "MAKTX", "WERKS", "MEINS"]);
    }

    #[test]
    fn aligns_output_to_template_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.xlsx");
        write_template(&path, &["MAKTX", "MATNR", "WERKS", "MEINS"]);

        let aligned = align_to_template(output_df(), &path, "ZH03");
        let names: Vec<&str> = aligned.get_column_names_str();
        assert_eq!(names, vec!["MAKTX", "MATNR", "WERKS", "MEINS"]);
        assert_eq!(column_value(&aligned, "MATNR", 0), "A1");
        // Untemplated generated column is dropped.
        assert!(aligned.column("EXTRA").is_err());
        // Template-only column is present but empty.
        assert_eq!(column_value(&aligned, "MEINS", 0), "");
        // Site code is forced.
        assert_eq!(column_value(&aligned, "WERKS", 1), "ZH03");
    }

    #[test]
    fn missing_template_leaves_output_unaligned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.xlsx");
        let aligned = align_to_template(output_df(), &path, "ZH03");
        assert!(aligned.column("EXTRA").is_ok());
    }
}
