//! DataFrame construction and value helpers.
//!
//! All source record sets are frames of string columns (the legacy extracts
//! carry no reliable types), so the helpers here render every Polars value
//! back to a plain string, with `Null` as the empty string.

use polars::prelude::{AnyValue, Column, DataFrame, PolarsResult};

/// Build an all-string DataFrame from parallel header/column vectors.
pub fn frame_from_columns(
    headers: Vec<String>,
    columns: Vec<Vec<String>>,
) -> PolarsResult<DataFrame> {
    let cols: Vec<Column> = headers
        .into_iter()
        .zip(columns)
        .map(|(name, values)| Column::new(name.into(), values))
        .collect();
    DataFrame::new(cols)
}

/// Converts a Polars AnyValue to its string representation.
/// Returns empty string for Null.
pub fn any_to_string(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::Float64(v) => format_numeric(v),
        AnyValue::Boolean(b) => if b { "J" } else { "N" }.to_string(),
        other => other.to_string(),
    }
}

/// Cell value at (`name`, `idx`), empty string for nulls or a missing column.
pub fn column_value(df: &DataFrame, name: &str, idx: usize) -> String {
    df.column(name)
        .ok()
        .and_then(|column| column.get(idx).ok())
        .map(any_to_string)
        .unwrap_or_default()
}

/// Formats a floating-point number without trailing zeros, so Excel's
/// float-typed article numbers come out as "12345" rather than "12345.0".
pub fn format_numeric(v: f64) -> String {
    let s = format!("{v}");
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}
