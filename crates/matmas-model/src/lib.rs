#![deny(unsafe_code)]

pub mod columns;
pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::{
    Calculation, FieldRule, LengthFallback, LengthRule, LookupFields, LookupSpec, MapFallback,
    MapRule, Settings,
};
