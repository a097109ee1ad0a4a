//! Custom calculation pass: formula-derived output columns.
//!
//! Calculations run after the field rules and may overwrite rule-produced
//! columns or add new ones. Formulas see the joined source record through
//! `row.*`, so calculations can combine legacy fields the rules never
//! touched.

use polars::prelude::{Column, DataFrame};
use tracing::warn;

use matmas_ingest::column_value;
use matmas_model::Calculation;

use crate::expr::{Expr, RowScope, Value};

/// Compiled calculations. Formulas that fail to parse are dropped with a
/// warning when the pass is built, so per-row evaluation never re-parses.
pub struct CalculationPass {
    compiled: Vec<(String, Expr)>,
}

impl CalculationPass {
    pub fn new(calculations: &[Calculation]) -> Self {
        let mut compiled = Vec::with_capacity(calculations.len());
        for calc in calculations {
            match Expr::parse(&calc.formula) {
                Ok(expr) => compiled.push((calc.target_column.clone(), expr)),
                Err(error) => {
                    warn!(
                        column = %calc.target_column,
                        formula = %calc.formula,
                        %error,
                        "skipping calculation with invalid formula"
                    );
                }
            }
        }
        Self { compiled }
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    /// Evaluate every calculation against `source` and write the results
    /// into `output`. A calculation that errors on any row is skipped
    /// whole, leaving the output column untouched.
    pub fn run(&self, source: &DataFrame, mut output: DataFrame) -> DataFrame {
        for (target, expr) in &self.compiled {
            let Some(values) = evaluate_column(expr, source, target) else {
                continue;
            };
            let column = Column::new(target.as_str().into(), values);
            if output.width() == 0 {
                match DataFrame::new(vec![column]) {
                    Ok(df) => output = df,
                    Err(error) => {
                        warn!(column = %target, %error, "could not seed output with calculated column");
                    }
                }
            } else if let Err(error) = output.with_column(column) {
                warn!(column = %target, %error, "could not attach calculated column");
            }
        }
        output
    }
}

fn evaluate_column(expr: &Expr, source: &DataFrame, target: &str) -> Option<Vec<String>> {
    let mut values = Vec::with_capacity(source.height());
    for idx in 0..source.height() {
        let scope = FrameRow { frame: source, idx };
        match expr.eval(&scope) {
            Ok(value) => values.push(value.render()),
            Err(error) => {
                warn!(column = %target, row = idx, %error, "calculation failed, skipping column");
                return None;
            }
        }
    }
    Some(values)
}

/// One row of a frame exposed to formula evaluation. Cells come through as
/// strings; numeric-looking cells are offered as numbers so arithmetic works
/// without explicit `num()` calls.
struct FrameRow<'a> {
    frame: &'a DataFrame,
    idx: usize,
}

impl RowScope for FrameRow<'_> {
    fn field(&self, name: &str) -> Option<Value> {
        if self.frame.column(name).is_err() {
            return None;
        }
        let text = column_value(self.frame, name, self.idx);
        if text.is_empty() {
            return Some(Value::Null);
        }
        if let Ok(number) = text.parse::<f64>() {
            return Some(Value::Num(number));
        }
        Some(Value::Str(text))
    }
}
