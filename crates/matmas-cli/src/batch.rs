//! Batch driver: convert every site export workbook in a folder.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{info, info_span, warn};

use matmas_transform::{Converter, site_code_from_path};

use crate::output::{is_batch_input, output_path, write_batch_summary, write_sap_csv};

/// Inputs to one batch run.
pub struct BatchOptions {
    pub input_folder: PathBuf,
    /// Defaults to `<input_folder>/output`.
    pub output_dir: Option<PathBuf>,
    pub settings: PathBuf,
    /// ISO reference date override for end-date filtering.
    pub date: Option<String>,
}

/// Per-file outcome of a batch run.
pub struct FileReport {
    pub input: PathBuf,
    pub site_code: String,
    /// Written output file; `None` when the input held no convertible
    /// records or conversion failed.
    pub output: Option<PathBuf>,
    pub rows: usize,
    /// Targets of field rules that failed for this file.
    pub faulted_fields: Vec<String>,
    pub error: Option<String>,
}

/// Result of a whole batch run.
pub struct BatchResult {
    pub reports: Vec<FileReport>,
    pub summary_file: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl BatchResult {
    pub fn has_errors(&self) -> bool {
        self.reports.iter().any(|report| report.error.is_some())
    }
}

/// Run the batch: one converter instance, shared mapping cache, one output
/// file per input plus a plain-text summary log. A failing file never stops
/// the rest of the batch.
pub fn run_batch(options: &BatchOptions) -> Result<BatchResult> {
    let batch_span = info_span!("batch", folder = %options.input_folder.display());
    let _batch_guard = batch_span.enter();

    let output_dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| options.input_folder.join("output"));
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("cannot create output dir {}", output_dir.display()))?;

    let converter = Converter::new(&options.settings)
        .with_context(|| format!("cannot load settings {}", options.settings.display()))?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

    let inputs = collect_inputs(&options.input_folder)?;
    if inputs.is_empty() {
        warn!(folder = %options.input_folder.display(), "no site export workbooks found");
        return Ok(BatchResult {
            reports: Vec::new(),
            summary_file: None,
            output_dir,
        });
    }
    info!(files = inputs.len(), "starting batch conversion");

    let mut reports = Vec::with_capacity(inputs.len());
    for input in &inputs {
        reports.push(convert_one(
            &converter,
            input,
            &output_dir,
            &timestamp,
            options.date.as_deref(),
        ));
    }

    let summary_file = output_dir.join(format!("batch_summary_{timestamp}.txt"));
    write_batch_summary(&summary_file, &summary_lines(&reports))?;
    info!(summary = %summary_file.display(), "batch finished");

    Ok(BatchResult {
        reports,
        summary_file: Some(summary_file),
        output_dir,
    })
}

fn collect_inputs(folder: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(folder)
        .with_context(|| format!("cannot read input folder {}", folder.display()))?;
    let mut inputs: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_batch_input(path))
        .collect();
    inputs.sort();
    Ok(inputs)
}

fn convert_one(
    converter: &Converter,
    input: &Path,
    output_dir: &Path,
    timestamp: &str,
    date: Option<&str>,
) -> FileReport {
    let site_code = site_code_from_path(input);
    let mut report = FileReport {
        input: input.to_path_buf(),
        site_code,
        output: None,
        rows: 0,
        faulted_fields: Vec::new(),
        error: None,
    };

    match converter.run(input, date) {
        Ok(outcome) => {
            report.rows = outcome.data.height();
            report.faulted_fields = outcome
                .faults
                .iter()
                .map(|fault| fault.target.clone())
                .collect();
            if outcome.is_empty() {
                info!(input = %input.display(), "no convertible records, no output written");
                return report;
            }
            let target = output_path(input, output_dir, timestamp);
            match write_sap_csv(&outcome.data, &target) {
                Ok(()) => report.output = Some(target),
                Err(error) => report.error = Some(format!("{error:#}")),
            }
        }
        Err(error) => {
            warn!(input = %input.display(), error = %format!("{error:#}"), "conversion failed");
            report.error = Some(format!("{error:#}"));
        }
    }
    report
}

fn summary_lines(reports: &[FileReport]) -> Vec<String> {
    let mut lines = vec![format!("Batch conversion, {} file(s)", reports.len())];
    for report in reports {
        let status = match (&report.error, &report.output) {
            (Some(error), _) => format!("FAILED: {error}"),
            (None, Some(output)) => format!("{} rows -> {}", report.rows, output.display()),
            (None, None) => "no convertible records".to_string(),
        };
        lines.push(format!("{}: {status}", report.input.display()));
        if !report.faulted_fields.is_empty() {
            lines.push(format!(
                "  faulted fields: {}",
                report.faulted_fields.join(", ")
            ));
        }
    }
    lines
}
