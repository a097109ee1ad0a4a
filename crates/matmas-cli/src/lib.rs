//! CLI library components for the MATMAS converter.

pub mod batch;
pub mod logging;
pub mod output;
