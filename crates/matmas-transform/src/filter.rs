//! Active-record filter: status flag plus end-date cutoff.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use polars::prelude::{BooleanChunked, DataFrame, NewChunkedArray};

use matmas_model::columns::{ACTIVE_FLAG, END_DATE_COLUMN, STATUS_COLUMN};

/// Resolve the filtering cutoff: today when no override is supplied.
pub fn resolve_reference_date(override_date: Option<&str>) -> Result<NaiveDate> {
    match override_date {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid reference date '{raw}', expected YYYY-MM-DD")),
        None => Ok(Local::now().date_naive()),
    }
}

/// Parse an end-date cell. `None` means "no end date": empty cells and
/// unparseable values never exclude a record on date grounds.
pub fn parse_end_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d"];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.date());
        }
    }
    None
}

/// Keep records whose status flag is the active marker and whose end date is
/// absent, unparseable, or on/after `reference_date`. Row order is preserved.
pub fn filter_active(df: &DataFrame, reference_date: NaiveDate) -> Result<DataFrame> {
    let status = df
        .column(STATUS_COLUMN)
        .with_context(|| format!("status column '{STATUS_COLUMN}' missing"))?
        .str()?;
    let end_dates = df
        .column(END_DATE_COLUMN)
        .with_context(|| format!("end-date column '{END_DATE_COLUMN}' missing"))?
        .str()?;

    let mut keep = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let active = status.get(idx).map(str::trim) == Some(ACTIVE_FLAG);
        let date_ok = match end_dates.get(idx).and_then(parse_end_date) {
            Some(end_date) => end_date >= reference_date,
            None => true,
        };
        keep.push(active && date_ok);
    }

    let mask = BooleanChunked::from_slice("active".into(), &keep);
    Ok(df.filter(&mask)?)
}
