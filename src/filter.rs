//! Row filtering for clean tables.
//!
//! A [`TableFilter`] never mutates the table it is applied to; it returns a new table so
//! that repeated filtering of one shared pipeline result stays side-effect free.

use crate::table::clean::CleanTable;
use crate::table::column::Value;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Selected values per categorical column and inclusive ranges per numeric column.
///
/// A row passes when it passes every constraint:
/// * a column named in the filter but absent from the table imposes no constraint
/// * an empty selection for a column rejects every row
/// * a missing value never passes an active constraint
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableFilter {
    pub selections: BTreeMap<String, BTreeSet<String>>,
    pub ranges: BTreeMap<String, (f64, f64)>,
}

impl TableFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps rows whose `column` value is one of `values`.
    pub fn select<I, S>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selections
            .insert(column.to_owned(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Keeps rows whose numeric `column` value lies within `[min, max]`.
    pub fn range(mut self, column: &str, min: f64, max: f64) -> Self {
        self.ranges.insert(column.to_owned(), (min, max));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty() && self.ranges.is_empty()
    }

    /// Indices of the rows that pass, in table order.
    pub fn matching_rows(&self, table: &CleanTable) -> Vec<usize> {
        let selections: Vec<(&[Value], &BTreeSet<String>)> = self
            .selections
            .iter()
            .filter_map(|(name, selected)| table.column(name).map(|column| (column.values.as_slice(), selected)))
            .collect();
        let ranges: Vec<(&[Value], (f64, f64))> = self
            .ranges
            .iter()
            .filter_map(|(name, range)| table.column(name).map(|column| (column.values.as_slice(), *range)))
            .collect();

        (0..table.row_count())
            .filter(|row| {
                selections.iter().all(|(values, selected)| {
                    values[*row]
                        .key()
                        .map(|key| selected.contains(&key))
                        .unwrap_or(false)
                }) && ranges.iter().all(|(values, (min, max))| {
                    values[*row]
                        .as_number()
                        .map(|number| *min <= number && number <= *max)
                        .unwrap_or(false)
                })
            })
            .collect()
    }

    /// A filtered copy of `table`.
    pub fn apply(&self, table: &CleanTable) -> CleanTable {
        if self.is_empty() {
            return table.clone();
        }
        table.select_rows(&self.matching_rows(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::column::Column;
    use crate::table::column::ColumnType;

    fn table() -> CleanTable {
        let text = |values: &[&str]| {
            values
                .iter()
                .map(|value| {
                    if value.is_empty() {
                        Value::Missing
                    } else {
                        Value::Text(value.to_string())
                    }
                })
                .collect()
        };
        CleanTable::new(vec![
            Column::new("Company", ColumnType::Categorical, text(&["A", "B", "A", ""])),
            Column::new(
                "Age (Years)",
                ColumnType::Numeric,
                vec![Value::Number(22.0), Value::Number(41.0), Value::Missing, Value::Number(30.0)],
            ),
        ])
    }

    #[test]
    fn selection_and_range_combine() {
        let filter = TableFilter::new().select("Company", ["A", "B"]).range("Age (Years)", 20.0, 35.0);
        assert_eq!(filter.matching_rows(&table()), vec![0]);
    }

    #[test]
    fn missing_values_fail_active_constraints() {
        let filter = TableFilter::new().select("Company", ["A", "B"]);
        assert_eq!(filter.matching_rows(&table()), vec![0, 1, 2]);
        let filter = TableFilter::new().range("Age (Years)", 0.0, 100.0);
        assert_eq!(filter.matching_rows(&table()), vec![0, 1, 3]);
    }

    #[test]
    fn empty_selection_rejects_everything() {
        let filter = TableFilter::new().select("Company", Vec::<String>::new());
        assert!(filter.apply(&table()).is_empty());
    }

    #[test]
    fn unknown_columns_are_ignored() {
        let filter = TableFilter::new().select("Region", ["North"]);
        assert_eq!(filter.apply(&table()).row_count(), 4);
    }

    #[test]
    fn apply_is_idempotent_and_leaves_input_untouched() {
        let table = table();
        let filter = TableFilter::new().select("Company", ["A"]);
        let once = filter.apply(&table);
        let twice = filter.apply(&once);

        assert_eq!(once, twice);
        assert_eq!(once.row_count(), 2);
        assert_eq!(table.row_count(), 4);
    }
}
