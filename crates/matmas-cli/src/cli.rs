//! CLI argument definitions for the MATMAS converter.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "matmas-convert",
    version,
    about = "MATMAS Converter - Convert legacy inventory exports to SAP import format",
    long_about = "Convert legacy hospital inventory exports to the SAP MATMAS import format.\n\n\
                  Field rules, mapping tables and custom calculations are driven by a\n\
                  JSON configuration; output columns follow the MATMAS import template."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Convert every site export workbook in a folder.
    Batch(BatchArgs),

    /// Show the configured field rules and calculations.
    Rules(RulesArgs),
}

#[derive(Parser)]
pub struct BatchArgs {
    /// Folder holding the site export workbooks (*_ZHxx.xlsx).
    #[arg(value_name = "INPUT_FOLDER")]
    pub input_folder: PathBuf,

    /// Output directory for converted files (default: <INPUT_FOLDER>/output).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Rule configuration file.
    #[arg(long = "settings", value_name = "PATH", default_value = "settings.json")]
    pub settings: PathBuf,

    /// Reference date for end-date filtering (YYYY-MM-DD, default: today).
    #[arg(long = "date", value_name = "DATE")]
    pub date: Option<String>,
}

#[derive(Parser)]
pub struct RulesArgs {
    /// Rule configuration file.
    #[arg(long = "settings", value_name = "PATH", default_value = "settings.json")]
    pub settings: PathBuf,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
