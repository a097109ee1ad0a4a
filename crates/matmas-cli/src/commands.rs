use anyhow::{Context, Result};
use comfy_table::Table;

use matmas_cli::batch::{BatchOptions, BatchResult, run_batch as run_batch_folder};
use matmas_model::{FieldRule, Settings};

use crate::cli::{BatchArgs, RulesArgs};
use crate::summary::apply_table_style;

pub fn run_batch(args: &BatchArgs) -> Result<BatchResult> {
    run_batch_folder(&BatchOptions {
        input_folder: args.input_folder.clone(),
        output_dir: args.output_dir.clone(),
        settings: args.settings.clone(),
        date: args.date.clone(),
    })
}

pub fn run_rules(args: &RulesArgs) -> Result<()> {
    let settings = Settings::load(&args.settings)
        .with_context(|| format!("cannot load settings {}", args.settings.display()))?;

    let mut table = Table::new();
    table.set_header(vec!["Target", "Type", "Source", "Details"]);
    apply_table_style(&mut table);
    for (target, rule) in &settings.mappings {
        let (kind, source, details) = describe_rule(rule);
        table.add_row(vec![target.clone(), kind.to_string(), source, details]);
    }
    println!("{table}");

    if !settings.custom_calculations.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Target", "Formula"]);
        apply_table_style(&mut table);
        for calc in &settings.custom_calculations {
            table.add_row(vec![calc.target_column.clone(), calc.formula.clone()]);
        }
        println!();
        println!("Calculations:");
        println!("{table}");
    }
    Ok(())
}

fn describe_rule(rule: &FieldRule) -> (&'static str, String, String) {
    match rule {
        FieldRule::FilenameExtraction => (
            "filename_extraction",
            "-".to_string(),
            "site code from input filename".to_string(),
        ),
        FieldRule::Direct { source } => ("direct", source.clone(), "-".to_string()),
        FieldRule::Map(rule) => (
            "map",
            rule.source.clone(),
            format!(
                "file: {}, fallback: {:?}",
                rule.lookup.map_file.as_deref().unwrap_or("-"),
                rule.fallback_strategy
            ),
        ),
        FieldRule::LogicLength(rule) => (
            "logic_length",
            rule.source.clone(),
            format!(
                "max length: {}, fallback: {:?}",
                rule.max_length, rule.fallback_strategy
            ),
        ),
    }
}
