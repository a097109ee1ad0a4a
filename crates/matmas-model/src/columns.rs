//! Well-known column names and literals of the legacy source layout.
//!
//! The source extracts always carry these columns regardless of site, so
//! they are fixed here rather than configured per run.

/// Shared article identifier joining Locations to Articles.
pub const JOIN_COLUMN: &str = "ArtikelNr";

/// Status flag column on the joined record set.
pub const STATUS_COLUMN: &str = "Actief";

/// Marker value for an active record.
pub const ACTIVE_FLAG: &str = "J";

/// End-of-life date column; empty or unparseable means "no end date".
pub const END_DATE_COLUMN: &str = "EindDat";

/// Target-side site/plant code column, forced from the filename-derived site code.
pub const SITE_CODE_COLUMN: &str = "WERKS";

/// Site code used when the filename does not yield one.
pub const DEFAULT_SITE_CODE: &str = "ZH01";

/// Sentinel for a lookup miss under the `error` fallback strategy.
pub const LOOKUP_MISS_SENTINEL: &str = "ERR";

/// Sentinel filled into an entire column when its rule fails.
pub const RULE_FAULT_SENTINEL: &str = "ERROR";
