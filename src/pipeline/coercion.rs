//! Type Coercion Engine.
//!
//! Each column is decided on its own: duration-like columns are reduced to their first
//! number (missing when a value has none), other columns become numeric when a majority of
//! their non-blank cells parse, and everything else is tagged categorical or text by
//! cardinality. A ragged column degrades to text. Both that and a duration column without
//! a single number are reported as a [`CoercionOutcome`]; neither fails the sheet.

use crate::config::FieldClass;
use crate::config::FieldClassifier;
use crate::config::PipelineConfig;
use crate::pipeline::region::RawColumn;
use crate::pipeline::PipelineError;
use crate::table::column::Column;
use crate::table::column::ColumnType;
use crate::table::column::Value;
use crate::table::grid::parse_number;
use crate::table::grid::GridCell;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt::Display;

/// A column that did not coerce cleanly.
#[derive(Clone, Debug, PartialEq)]
pub enum CoercionOutcome {
    /// The column's cell count disagrees with the region's row count
    RaggedColumn { column: String, expected: usize, found: usize },
    /// A duration column none of whose values carry a number; every value became missing
    NoDurationTokens { column: String },
}

impl CoercionOutcome {
    pub fn column(&self) -> &str {
        match self {
            CoercionOutcome::RaggedColumn { column, .. } | CoercionOutcome::NoDurationTokens { column } => column,
        }
    }
}

impl Display for CoercionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoercionOutcome::RaggedColumn { column, expected, found } => {
                write!(f, "column '{column}' has {found} cells, expected {expected}; kept as text")
            }
            CoercionOutcome::NoDurationTokens { column } => {
                write!(f, "duration column '{column}' has no numeric values; all set to missing")
            }
        }
    }
}

/// Coerced columns of one sheet plus the degradations that happened on the way.
#[derive(Clone, Debug, Default)]
pub struct CoercionReport {
    pub columns: Vec<Column>,
    pub outcomes: Vec<CoercionOutcome>,
}

pub struct CoercionEngine<'a> {
    config: &'a PipelineConfig,
    classifier: FieldClassifier,
    duration_token: Regex,
}

impl<'a> CoercionEngine<'a> {
    pub fn new(config: &'a PipelineConfig) -> Result<Self, PipelineError> {
        Ok(CoercionEngine {
            config,
            classifier: config.classifier(),
            duration_token: config.duration_regex()?,
        })
    }

    /// Coerces every column of a region, degrading ragged columns to text.
    pub fn coerce(&self, columns: Vec<RawColumn>, rows: usize) -> CoercionReport {
        let mut report = CoercionReport::default();
        let nulls = &self.config.null_literals;
        for raw in columns {
            match self.coerce_column(&raw, rows) {
                Ok(column) => {
                    if column.kind.is_numeric()
                        && column.responses() == 0
                        && raw.cells.iter().any(|cell| !cell.is_blank(nulls))
                    {
                        report.outcomes.push(CoercionOutcome::NoDurationTokens {
                            column: raw.name.to_owned(),
                        });
                    }
                    report.columns.push(column);
                }
                Err(outcome) => {
                    report.columns.push(self.as_text(raw, rows));
                    report.outcomes.push(outcome);
                }
            }
        }
        report
    }

    /// Decides the type of one column and converts its values.
    pub fn coerce_column(&self, raw: &RawColumn, rows: usize) -> Result<Column, CoercionOutcome> {
        if raw.cells.len() != rows {
            return Err(CoercionOutcome::RaggedColumn {
                column: raw.name.to_owned(),
                expected: rows,
                found: raw.cells.len(),
            });
        }
        if self.classifier.is(&raw.name, FieldClass::Duration) {
            return Ok(self.coerce_duration(raw));
        }

        let nulls = &self.config.null_literals;
        let non_blank = raw.cells.iter().filter(|cell| !cell.is_blank(nulls)).count();
        let numbers: Vec<Option<f64>> = raw
            .cells
            .iter()
            .map(|cell| if cell.is_blank(nulls) { None } else { cell.to_number() })
            .collect();
        let parsed = numbers.iter().flatten().count();
        let eligible = !self.config.coerce_hinted_only || self.classifier.is(&raw.name, FieldClass::NumericHint);
        if eligible && non_blank > 0 && parsed as f64 > self.config.numeric_threshold * non_blank as f64 {
            let values = numbers.into_iter().map(|number| number.map_or(Value::Missing, Value::Number)).collect();
            return Ok(Column::new(raw.name.to_owned(), ColumnType::Numeric, values));
        }
        Ok(self.as_text(raw.clone(), rows))
    }

    /// First numeric token of each value ("14 months" → 14); values without one are missing.
    fn coerce_duration(&self, raw: &RawColumn) -> Column {
        let nulls = &self.config.null_literals;
        let values: Vec<Value> = raw
            .cells
            .iter()
            .map(|cell| match cell {
                _ if cell.is_blank(nulls) => Value::Missing,
                GridCell::Number(number) => Value::Number(*number),
                _ => self
                    .duration_token
                    .find(&cell.as_text())
                    .and_then(|token| parse_number(token.as_str()))
                    .map_or(Value::Missing, Value::Number),
            })
            .collect();
        Column::new(raw.name.to_owned(), ColumnType::Numeric, values)
    }

    /// Keeps trimmed text (numbers in display form) and tags by cardinality. Ragged input is
    /// padded with missing values or cut to `rows`.
    fn as_text(&self, raw: RawColumn, rows: usize) -> Column {
        let nulls = &self.config.null_literals;
        let mut values: Vec<Value> = raw
            .cells
            .iter()
            .map(|cell| {
                if cell.is_blank(nulls) {
                    Value::Missing
                } else {
                    Value::Text(cell.as_text().trim().to_owned())
                }
            })
            .collect();
        values.resize(rows, Value::Missing);
        let unique: BTreeSet<&str> = values.iter().filter_map(Value::as_text).collect();
        let kind = ColumnType::from_cardinality(unique.len(), self.config.categorical_max_unique);
        Column::new(raw.name, kind, values)
    }
}
