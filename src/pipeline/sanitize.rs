//! Column Sanitizer: prunes empty, nearly empty and degenerate columns.

use crate::config::FieldClass;
use crate::config::FieldClassifier;
use crate::config::PipelineConfig;
use crate::table::column::Column;
use serde::Serialize;
use std::fmt::Display;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DropReason {
    /// Every cell is missing or blank
    AllBlank,
    /// An optional free-text field with too few answers
    KnownSparse { responses: usize },
    /// Near-constant and near-empty
    Degenerate { unique: usize, responses: usize },
}

impl Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::AllBlank => write!(f, "all values blank"),
            DropReason::KnownSparse { responses } => write!(f, "sparse field with {responses} responses"),
            DropReason::Degenerate { unique, responses } => {
                write!(f, "{unique} distinct values in {responses} responses")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DroppedColumn {
    pub sheet: String,
    pub name: String,
    #[serde(flatten)]
    pub reason: DropReason,
}

pub struct ColumnSanitizer {
    classifier: FieldClassifier,
    min_sparse_responses: usize,
    min_degenerate_responses: usize,
    degenerate_max_unique: usize,
}

impl ColumnSanitizer {
    pub fn new(config: &PipelineConfig) -> Self {
        ColumnSanitizer {
            classifier: config.classifier(),
            min_sparse_responses: config.min_sparse_responses,
            min_degenerate_responses: config.min_degenerate_responses,
            degenerate_max_unique: config.degenerate_max_unique,
        }
    }

    /// Reason to drop `column`, if any of the pruning rules holds.
    pub fn check(&self, column: &Column) -> Option<DropReason> {
        let responses = column.responses();
        if responses == 0 {
            return Some(DropReason::AllBlank);
        }
        if responses < self.min_sparse_responses && self.classifier.is(&column.name, FieldClass::KnownSparse) {
            return Some(DropReason::KnownSparse { responses });
        }
        let unique = column.distinct().len();
        if unique <= self.degenerate_max_unique && responses < self.min_degenerate_responses {
            return Some(DropReason::Degenerate { unique, responses });
        }
        None
    }

    /// Splits `columns` into the retained ones, in order, and the drop records.
    pub fn sanitize(&self, sheet: &str, columns: Vec<Column>) -> (Vec<Column>, Vec<DroppedColumn>) {
        let mut kept = Vec::with_capacity(columns.len());
        let mut dropped = Vec::new();
        for column in columns {
            match self.check(&column) {
                Some(reason) => dropped.push(DroppedColumn {
                    sheet: sheet.to_owned(),
                    name: column.name,
                    reason,
                }),
                None => kept.push(column),
            }
        }
        (kept, dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::column::ColumnType;
    use crate::table::column::Value;

    fn column(name: &str, answers: &[&str], rows: usize) -> Column {
        let mut values: Vec<Value> = answers.iter().map(|answer| Value::Text(answer.to_string())).collect();
        values.resize(rows, Value::Missing);
        Column::new(name, ColumnType::Categorical, values)
    }

    #[test]
    fn near_constant_near_empty_column_is_dropped() {
        let sanitizer = ColumnSanitizer::new(&PipelineConfig::default());
        let (kept, dropped) = sanitizer.sanitize(
            "Wave 1",
            vec![column("Bonus", &["yes", "no"], 100), column("Shift", &["a", "b", "c"], 100)],
        );

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "Shift");
        assert_eq!(
            dropped,
            vec![DroppedColumn {
                sheet: "Wave 1".to_owned(),
                name: "Bonus".to_owned(),
                reason: DropReason::Degenerate { unique: 2, responses: 2 },
            }]
        );
    }

    #[test]
    fn repeated_value_with_enough_responses_is_kept() {
        let sanitizer = ColumnSanitizer::new(&PipelineConfig::default());
        assert_eq!(sanitizer.check(&column("Vehicle", &["bike", "bike", "bike"], 10)), None);
    }

    #[test]
    fn blank_strings_count_as_empty() {
        let sanitizer = ColumnSanitizer::new(&PipelineConfig::default());
        let reason = sanitizer.check(&column("Empty_Col_4", &[" ", ""], 5));
        assert_eq!(reason, Some(DropReason::AllBlank));
    }

    #[test]
    fn known_sparse_fields_need_more_responses() {
        let sanitizer = ColumnSanitizer::new(&PipelineConfig::default());
        let answers = ["late pay", "fuel", "hours", "app crashes"];

        let reason = sanitizer.check(&column("Other (please specify)", &answers, 40));
        assert_eq!(reason, Some(DropReason::KnownSparse { responses: 4 }));
        assert_eq!(sanitizer.check(&column("Main issue", &answers, 40)), None);
    }

    #[test]
    fn thresholds_can_disable_pruning() {
        let config = PipelineConfig {
            min_sparse_responses: 0,
            min_degenerate_responses: 0,
            ..PipelineConfig::default()
        };
        let sanitizer = ColumnSanitizer::new(&config);
        assert_eq!(sanitizer.check(&column("Comment", &["one"], 10)), None);
    }
}
