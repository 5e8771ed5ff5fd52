//! Summaries of a clean table: grouped aggregates, cross tabulations, value counts and
//! numeric binning.
//!
//! Blank values never form a group, a crosstab cell or a count.

use crate::table::clean::CleanTable;
use crate::table::column::Column;
use crate::table::column::ColumnType;
use crate::table::column::Value;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Bin edges of the age groups used by the survey dashboard.
pub const AGE_GROUP_EDGES: [f64; 5] = [0.0, 25.0, 35.0, 45.0, 100.0];
/// Labels of [`AGE_GROUP_EDGES`].
pub const AGE_GROUP_LABELS: [&str; 4] = ["18-25", "26-35", "36-45", "46+"];

/// Label of the margin row and column of a [`Crosstab`].
pub const MARGIN_LABEL: &str = "All";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("Column '{0}' is not numeric")]
    NotNumeric(String),

    #[error("Invalid aggregate '{0}'")]
    InvalidAggregate(String),

    #[error("{0} bin edges need {1} labels")]
    InvalidBins(usize, usize),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    Mean,
    Sum,
    Count,
    Min,
    Max,
}

impl Aggregate {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Aggregate::Mean => "mean",
            Aggregate::Sum => "sum",
            Aggregate::Count => "count",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
        }
    }

    /// Folds the non-missing values of one group; `None` when nothing is left to fold,
    /// except for `Count` which is always defined.
    fn apply(&self, values: &[f64]) -> Option<f64> {
        if let Aggregate::Count = self {
            return Some(values.len() as f64);
        }
        if values.is_empty() {
            return None;
        }
        Some(match self {
            Aggregate::Sum => values.iter().sum(),
            Aggregate::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Aggregate::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregate::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregate::Count => values.len() as f64,
        })
    }
}

impl FromStr for Aggregate {
    type Err = AnalysisError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mean" | "avg" | "average" => Ok(Aggregate::Mean),
            "sum" => Ok(Aggregate::Sum),
            "count" => Ok(Aggregate::Count),
            "min" => Ok(Aggregate::Min),
            "max" => Ok(Aggregate::Max),
            _ => Err(AnalysisError::InvalidAggregate(name.to_owned())),
        }
    }
}

impl Display for Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Count table of two columns, optionally with an [`MARGIN_LABEL`] row and column.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Crosstab {
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    /// `counts[row][column]`
    pub counts: Vec<Vec<usize>>,
}

impl Crosstab {
    pub fn count(&self, row: &str, column: &str) -> Option<usize> {
        let row = self.row_labels.iter().position(|label| label == row)?;
        let column = self.column_labels.iter().position(|label| label == column)?;
        Some(self.counts[row][column])
    }
}

fn require<'a>(table: &'a CleanTable, name: &str) -> Result<&'a Column, AnalysisError> {
    table
        .column(name)
        .ok_or_else(|| AnalysisError::MissingColumn(name.to_owned()))
}

fn require_numeric<'a>(table: &'a CleanTable, name: &str) -> Result<&'a Column, AnalysisError> {
    let column = require(table, name)?;
    if column.kind.is_numeric() {
        Ok(column)
    } else {
        Err(AnalysisError::NotNumeric(name.to_owned()))
    }
}

/// Aggregates the numeric column `value` per distinct value of `by`, groups sorted by key.
pub fn group_aggregate(
    table: &CleanTable,
    by: &str,
    value: &str,
    aggregate: Aggregate,
) -> Result<Vec<(String, Option<f64>)>, AnalysisError> {
    let keys = require(table, by)?;
    let values = require_numeric(table, value)?;
    let mut groups = BTreeMap::<String, Vec<f64>>::new();
    for (key, value) in keys.values.iter().zip(&values.values) {
        if let Some(key) = key.key() {
            let group = groups.entry(key).or_default();
            group.extend(value.as_number());
        }
    }
    Ok(groups
        .into_iter()
        .map(|(key, group)| {
            let result = aggregate.apply(&group);
            (key, result)
        })
        .collect())
}

/// Counts row/column value pairs; rows blank in either column are left out.
pub fn crosstab(table: &CleanTable, rows: &str, columns: &str, margins: bool) -> Result<Crosstab, AnalysisError> {
    let row_values = require(table, rows)?;
    let column_values = require(table, columns)?;
    let mut pairs = BTreeMap::<(String, String), usize>::new();
    for (row, column) in row_values.values.iter().zip(&column_values.values) {
        if let (Some(row), Some(column)) = (row.key(), column.key()) {
            *pairs.entry((row, column)).or_default() += 1;
        }
    }
    let row_labels: Vec<String> = ordered_labels(row_values, pairs.keys().map(|(row, _)| row));
    let column_labels: Vec<String> = ordered_labels(column_values, pairs.keys().map(|(_, column)| column));
    let mut counts: Vec<Vec<usize>> = row_labels
        .iter()
        .map(|row| {
            column_labels
                .iter()
                .map(|column| pairs.get(&(row.to_owned(), column.to_owned())).copied().unwrap_or(0))
                .collect()
        })
        .collect();

    let mut crosstab = Crosstab {
        row_labels,
        column_labels,
        counts: Vec::new(),
    };
    if margins {
        for row in &mut counts {
            let total: usize = row.iter().sum();
            row.push(total);
        }
        let totals: Vec<usize> = (0..crosstab.column_labels.len() + 1)
            .map(|column| counts.iter().map(|row| row[column]).sum())
            .collect();
        counts.push(totals);
        crosstab.row_labels.push(MARGIN_LABEL.to_owned());
        crosstab.column_labels.push(MARGIN_LABEL.to_owned());
    }
    crosstab.counts = counts;
    Ok(crosstab)
}

/// Crosstab labels: bins keep their label order, other columns sort by value.
fn ordered_labels<'a>(column: &Column, present: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut labels: Vec<String> = present.cloned().collect();
    labels.sort();
    labels.dedup();
    if column.kind == ColumnType::Categorical {
        if let Some(order) = bin_order(column) {
            labels.sort_by_key(|label| order.get(label).copied().unwrap_or(usize::MAX));
        }
    }
    labels
}

/// Age group labels sort by their position in [`AGE_GROUP_LABELS`] rather than lexically.
fn bin_order(column: &Column) -> Option<HashMap<String, usize>> {
    let order: HashMap<String, usize> = AGE_GROUP_LABELS
        .iter()
        .enumerate()
        .map(|(index, label)| (label.to_string(), index))
        .collect();
    column
        .distinct()
        .iter()
        .all(|value| order.contains_key(value))
        .then_some(order)
}

/// Distinct values with their frequency, most frequent first and ties by value.
pub fn value_counts(table: &CleanTable, column: &str) -> Result<Vec<(String, usize)>, AnalysisError> {
    let column = require(table, column)?;
    let mut counts = BTreeMap::<String, usize>::new();
    for key in column.values.iter().filter_map(Value::key) {
        *counts.entry(key).or_default() += 1;
    }
    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort_by(|(a, a_count), (b, b_count)| b_count.cmp(a_count).then_with(|| a.cmp(b)));
    Ok(counts)
}

/// The most frequent value, the smallest one on ties.
pub fn mode(table: &CleanTable, column: &str) -> Result<Option<String>, AnalysisError> {
    Ok(value_counts(table, column)?.into_iter().next().map(|(value, _)| value))
}

/// Percentage of all rows whose value equals `expected` (e.g. the share answering "Yes").
pub fn share_equal(table: &CleanTable, column: &str, expected: &str) -> Result<Option<f64>, AnalysisError> {
    let column = require(table, column)?;
    if column.is_empty() {
        return Ok(None);
    }
    let matches = column
        .values
        .iter()
        .filter(|value| value.key().as_deref() == Some(expected))
        .count();
    Ok(Some(matches as f64 * 100.0 / column.len() as f64))
}

/// Mean of the non-missing values of a numeric column.
pub fn mean(table: &CleanTable, column: &str) -> Result<Option<f64>, AnalysisError> {
    let column = require_numeric(table, column)?;
    let values: Vec<f64> = column.numbers().collect();
    Ok(Aggregate::Mean.apply(&values))
}

/// Bins a numeric column into a categorical one named `name`. Bins are right-inclusive,
/// `(edges[i], edges[i + 1]]`, and values outside every bin become missing.
pub fn bin_numeric(
    table: &CleanTable,
    column: &str,
    name: &str,
    edges: &[f64],
    labels: &[&str],
) -> Result<Column, AnalysisError> {
    if edges.len() < 2 || labels.len() + 1 != edges.len() {
        return Err(AnalysisError::InvalidBins(edges.len(), edges.len().saturating_sub(1)));
    }
    let source = require_numeric(table, column)?;
    let values = source
        .values
        .iter()
        .map(|value| {
            value
                .as_number()
                .and_then(|number| {
                    edges
                        .windows(2)
                        .position(|bin| bin[0] < number && number <= bin[1])
                })
                .map_or(Value::Missing, |bin| Value::Text(labels[bin].to_owned()))
        })
        .collect();
    Ok(Column::new(name, ColumnType::Categorical, values))
}

/// [`bin_numeric`] with the dashboard's age groups.
pub fn age_groups(table: &CleanTable, column: &str) -> Result<Column, AnalysisError> {
    bin_numeric(table, column, "Age Group", &AGE_GROUP_EDGES, &AGE_GROUP_LABELS)
}
