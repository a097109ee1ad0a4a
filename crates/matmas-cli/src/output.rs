//! SAP import file writing.
//!
//! Output files are semicolon-delimited CSV with a UTF-8 byte order mark,
//! the encoding the SAP import tooling expects. One output file per input,
//! named `<input stem>_SAP_<timestamp>.csv`.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::DataFrame;

use matmas_ingest::column_value;

const UTF8_BOM: &str = "\u{feff}";

/// Batch inputs are site export workbooks: `.xlsx` files whose stem carries
/// a `_ZH` site suffix.
pub fn is_batch_input(path: &Path) -> bool {
    let is_xlsx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
    let has_site = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.contains("_ZH"));
    is_xlsx && has_site
}

/// Output path for one converted input: `<stem>_SAP_<timestamp>.csv` in the
/// output directory.
pub fn output_path(input: &Path, output_dir: &Path, timestamp: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("output");
    output_dir.join(format!("{stem}_SAP_{timestamp}.csv"))
}

/// Write the converted rows as semicolon-delimited CSV with a UTF-8 BOM.
pub fn write_sap_csv(data: &DataFrame, path: &Path) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    file.write_all(UTF8_BOM.as_bytes())
        .with_context(|| format!("cannot write {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_writer(file);
    writer
        .write_record(data.get_column_names_str())
        .context("write csv header")?;
    for idx in 0..data.height() {
        let row: Vec<String> = data
            .get_column_names_str()
            .iter()
            .map(|name| column_value(data, name, idx))
            .collect();
        writer.write_record(&row).context("write csv row")?;
    }
    writer.flush().context("flush csv output")?;
    Ok(())
}

/// Write the plain-text batch summary next to the output files.
pub fn write_batch_summary(path: &Path, lines: &[String]) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    for line in lines {
        writeln!(file, "{line}").with_context(|| format!("cannot write {}", path.display()))?;
    }
    Ok(())
}
