use crate::table::grid::format_number;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Display;

/// Type tag decided once per column by the coercion engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// Double-precision numbers, failed parses stored as missing
    Numeric,
    /// Low-cardinality text, offered as a multi-select filter
    Categorical,
    /// Free text
    Text,
}

impl ColumnType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Categorical => "categorical",
            ColumnType::Text => "text",
        }
    }

    /// Tag for a non-numeric column from its distinct non-blank value count.
    pub fn from_cardinality(unique: usize, categorical_max_unique: usize) -> Self {
        if unique < categorical_max_unique {
            ColumnType::Categorical
        } else {
            ColumnType::Text
        }
    }

    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Numeric)
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value of a clean column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Missing,
    Number(f64),
    Text(String),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Missing or whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Number(number) => number.is_nan(),
            Value::Text(text) => text.trim().is_empty(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Key used for distinct-value counting and grouping; `None` for blanks.
    pub fn key(&self) -> Option<String> {
        if self.is_blank() {
            None
        } else {
            Some(self.to_string())
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Number(number) => f.write_str(&format_number(*number)),
            Value::Text(text) => f.write_str(text),
        }
    }
}

/// A named, typed column of the clean table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnType, values: Vec<Value>) -> Self {
        Column {
            name: name.into(),
            kind,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of non-blank values.
    pub fn responses(&self) -> usize {
        self.values.iter().filter(|value| !value.is_blank()).count()
    }

    /// Distinct non-blank values in their display form.
    pub fn distinct(&self) -> BTreeSet<String> {
        self.values.iter().filter_map(Value::key).collect()
    }

    /// Numeric values, skipping missing entries.
    pub fn numbers(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().filter_map(Value::as_number)
    }

    /// Rewrites every value as text and re-derives the categorical/text tag.
    pub(crate) fn demote_to_text(&mut self, categorical_max_unique: usize) {
        for value in &mut self.values {
            if let Value::Number(number) = value {
                *value = Value::Text(format_number(*number));
            }
        }
        self.kind = ColumnType::from_cardinality(self.distinct().len(), categorical_max_unique);
    }
}
