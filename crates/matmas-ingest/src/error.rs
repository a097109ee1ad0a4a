//! Error types for source data ingestion.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to open workbook {path}: {message}")]
    Workbook { path: PathBuf, message: String },

    #[error("no worksheet named {tried} in {path}")]
    SheetNotFound { path: PathBuf, tried: String },

    #[error("no readable csv for {name} next to {path}")]
    CsvNotFound { path: PathBuf, name: &'static str },

    #[error("failed to read csv {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("join column '{column}' missing from the {side} record set")]
    JoinColumnMissing { column: String, side: &'static str },

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),
}
