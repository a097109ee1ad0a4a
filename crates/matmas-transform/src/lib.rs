#![deny(unsafe_code)]

pub mod calc;
pub mod converter;
pub mod engine;
pub mod expr;
pub mod filter;
pub mod template;

pub use calc::CalculationPass;
pub use converter::{ConversionOutcome, Converter, site_code_from_path};
pub use engine::{FieldFault, apply_rules};
pub use expr::{Expr, ExprError, RowScope, Value};
pub use filter::{filter_active, parse_end_date, resolve_reference_date};
pub use template::align_to_template;
