#![deny(unsafe_code)]

pub mod error;
pub mod frame;
pub mod source;
pub mod workbook;

pub use error::IngestError;
pub use frame::{any_to_string, column_value, format_numeric, frame_from_columns};
pub use source::{ingest, join_sources, read_csv_frame};
pub use workbook::read_sheet;
