//! End-to-end conversion of one legacy workbook into SAP import rows.

use std::path::Path;

use anyhow::Result;
use polars::prelude::DataFrame;
use tracing::{info, info_span};

use matmas_ingest::ingest;
use matmas_map::MappingService;
use matmas_model::columns::DEFAULT_SITE_CODE;
use matmas_model::{ConfigError, Settings};

use crate::calc::CalculationPass;
use crate::engine::{FieldFault, apply_rules};
use crate::filter::{filter_active, resolve_reference_date};
use crate::template::align_to_template;

/// Result of converting one input file.
#[derive(Debug)]
pub struct ConversionOutcome {
    /// Template-aligned output rows. Empty when the input held no
    /// convertible records.
    pub data: DataFrame,
    /// Field rules that failed during this run.
    pub faults: Vec<FieldFault>,
}

impl ConversionOutcome {
    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }

    fn empty() -> Self {
        Self {
            data: DataFrame::empty(),
            faults: Vec::new(),
        }
    }
}

/// Derive the site code from the input filename: the segment after the last
/// underscore of the stem (`Inventory_ZH02.xlsx` yields `ZH02`).
pub fn site_code_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.rsplit('_').next())
        .filter(|segment| !segment.is_empty())
        .unwrap_or(DEFAULT_SITE_CODE)
        .to_string()
}

/// Converts legacy inventory workbooks according to one rule configuration.
/// Mapping tables are cached across runs, so one converter should serve a
/// whole batch.
pub struct Converter {
    settings: Settings,
    mapper: MappingService,
}

impl Converter {
    pub fn new(settings_path: &Path) -> Result<Self, ConfigError> {
        let settings = Settings::load(settings_path)?;
        Ok(Self::from_settings(settings))
    }

    pub fn from_settings(settings: Settings) -> Self {
        let mapper = MappingService::new(&settings.mapping_folder);
        Self { settings, mapper }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the full pipeline for one input file.
    ///
    /// `date_override` replaces "today" as the end-date cutoff and must be
    /// ISO formatted. An input without usable records yields an empty
    /// outcome rather than an error.
    pub fn run(&self, input: &Path, date_override: Option<&str>) -> Result<ConversionOutcome> {
        let span = info_span!("convert", input = %input.display());
        let _guard = span.enter();

        let reference_date = resolve_reference_date(date_override)?;
        let site_code = site_code_from_path(input);
        info!(%site_code, %reference_date, "starting conversion");

        let joined = ingest(input)?;
        if joined.height() == 0 {
            info!("no source records, skipping");
            return Ok(ConversionOutcome::empty());
        }
        info!(rows = joined.height(), "joined article and location records");

        let active = filter_active(&joined, reference_date)?;
        info!(rows = active.height(), "filtered to active records");
        if active.height() == 0 {
            return Ok(ConversionOutcome::empty());
        }

        let (output, faults) = apply_rules(&active, &site_code, &self.settings, &self.mapper)?;
        if !faults.is_empty() {
            info!(faults = faults.len(), "field rules reported faults");
        }

        let calculations = CalculationPass::new(&self.settings.custom_calculations);
        let output = calculations.run(&active, output);

        let template = Path::new(&self.settings.template_file);
        let data = align_to_template(output, template, &site_code);
        info!(rows = data.height(), columns = data.width(), "conversion finished");

        Ok(ConversionOutcome { data, faults })
    }
}
