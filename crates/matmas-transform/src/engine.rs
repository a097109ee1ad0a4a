//! Field rule engine: one output column per configured rule.
//!
//! Rules run in configuration order. A failing rule never aborts the
//! conversion: its column is filled with the `ERROR` sentinel and the fault
//! is recorded for the run's diagnostics.

use std::sync::Arc;

use anyhow::{Context, Result};
use polars::prelude::{Column, DataFrame, PolarsResult};
use tracing::warn;

use matmas_map::{MappingService, MappingTable};
use matmas_model::columns::{LOOKUP_MISS_SENTINEL, RULE_FAULT_SENTINEL};
use matmas_model::{FieldRule, LengthFallback, LengthRule, MapFallback, MapRule, Settings};

/// A rule that could not be evaluated; its column carries the sentinel.
#[derive(Debug, Clone)]
pub struct FieldFault {
    pub target: String,
    pub message: String,
}

/// Apply all configured field rules to the filtered record set.
///
/// Returns the generated output columns (in rule order) plus the faults of
/// rules that failed. Only assembling the final frame can error.
pub fn apply_rules(
    source: &DataFrame,
    site_code: &str,
    settings: &Settings,
    mapper: &MappingService,
) -> PolarsResult<(DataFrame, Vec<FieldFault>)> {
    let height = source.height();
    let mut columns: Vec<Column> = Vec::with_capacity(settings.mappings.len());
    let mut faults = Vec::new();

    for (target, rule) in &settings.mappings {
        let column = match build_column(source, site_code, target, rule, mapper) {
            Ok(column) => column,
            Err(error) => {
                warn!(column = %target, %error, "field rule failed, filling sentinel column");
                faults.push(FieldFault {
                    target: target.clone(),
                    message: format!("{error:#}"),
                });
                Column::new(
                    target.as_str().into(),
                    vec![RULE_FAULT_SENTINEL.to_string(); height],
                )
            }
        };
        upsert_column(&mut columns, column);
    }

    Ok((DataFrame::new(columns)?, faults))
}

/// Duplicate targets in the configuration behave like repeated assignment:
/// the later rule wins.
fn upsert_column(columns: &mut Vec<Column>, column: Column) {
    if let Some(existing) = columns.iter_mut().find(|c| c.name() == column.name()) {
        *existing = column;
    } else {
        columns.push(column);
    }
}

fn build_column(
    source: &DataFrame,
    site_code: &str,
    target: &str,
    rule: &FieldRule,
    mapper: &MappingService,
) -> Result<Column> {
    match rule {
        FieldRule::FilenameExtraction => Ok(Column::new(
            target.into(),
            vec![site_code.to_string(); source.height()],
        )),
        FieldRule::Direct { source: src } => {
            let column = source
                .column(src)
                .with_context(|| format!("source column '{src}' missing"))?
                .clone();
            Ok(column.with_name(target.into()))
        }
        FieldRule::Map(rule) => map_column(source, target, rule, mapper),
        FieldRule::LogicLength(rule) => length_column(source, target, rule, mapper),
    }
}

fn map_column(
    source: &DataFrame,
    target: &str,
    rule: &MapRule,
    mapper: &MappingService,
) -> Result<Column> {
    let values = string_values(source, &rule.source)?;
    let table = resolve_table(rule.lookup.spec().as_ref(), mapper);

    let out: Vec<String> = values
        .into_iter()
        .map(|raw| {
            let original = raw.unwrap_or_default();
            let normalized = original.trim().to_uppercase();
            match table.get(&normalized) {
                Some(mapped) => mapped.clone(),
                None => match rule.fallback_strategy {
                    MapFallback::SourceValue => original,
                    MapFallback::DefaultValue => rule.default_value.clone(),
                    MapFallback::Error => LOOKUP_MISS_SENTINEL.to_string(),
                },
            }
        })
        .collect();
    Ok(Column::new(target.into(), out))
}

fn length_column(
    source: &DataFrame,
    target: &str,
    rule: &LengthRule,
    mapper: &MappingService,
) -> Result<Column> {
    let values = string_values(source, &rule.source)?;
    let table = resolve_table(rule.lookup.spec().as_ref(), mapper);

    let out: Vec<String> = values
        .into_iter()
        .map(|raw| {
            let trimmed = raw.unwrap_or_default().trim().to_string();
            if trimmed.chars().count() <= rule.max_length {
                return trimmed;
            }
            // Over the limit: a lookup hit wins regardless of its length.
            if let Some(mapped) = table.get(&trimmed.to_uppercase()) {
                return mapped.clone();
            }
            match rule.fallback_strategy {
                LengthFallback::Truncate => trimmed.chars().take(rule.max_length).collect(),
                LengthFallback::Keep => trimmed,
            }
        })
        .collect();
    Ok(Column::new(target.into(), out))
}

fn resolve_table(
    spec: Option<&matmas_model::LookupSpec>,
    mapper: &MappingService,
) -> Arc<MappingTable> {
    match spec {
        Some(spec) => mapper.resolve(spec),
        None => Arc::new(MappingTable::new()),
    }
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .with_context(|| format!("source column '{name}' missing"))?;
    let ca = column
        .str()
        .with_context(|| format!("source column '{name}' is not a string column"))?;
    Ok(ca
        .into_iter()
        .map(|opt| opt.map(ToString::to_string))
        .collect())
}
