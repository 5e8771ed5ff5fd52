use crate::table::column::Column;
use crate::table::column::ColumnType;
use crate::table::column::Value;
use serde::Serialize;

/// The normalized output of the pipeline: uniquely named, typed, equal-length columns
/// that stay row-aligned with the original respondents.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CleanTable {
    columns: Vec<Column>,
    rows: usize,
}

/// Values a UI needs to build its filter widgets.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FilterSurface {
    /// Sorted distinct values per categorical column
    pub categorical: Vec<(String, Vec<String>)>,
    /// (min, max) per numeric column that has at least one value
    pub numeric: Vec<(String, (f64, f64))>,
}

impl CleanTable {
    /// Builds a table from columns of equal length.
    ///
    /// # Panics
    ///
    /// Panics if the columns differ in length; every pipeline stage preserves row alignment
    /// so a mismatch is a programming error.
    pub fn new(columns: Vec<Column>) -> Self {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        assert!(
            columns.iter().all(|column| column.len() == rows),
            "clean table columns must have equal length"
        );
        CleanTable { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// A copy with `column` appended, or replacing the column of the same name. The column
    /// must have one value per row.
    pub fn with_column(&self, column: Column) -> CleanTable {
        let mut columns = self.columns.clone();
        match columns.iter_mut().find(|existing| existing.name == column.name) {
            Some(existing) => *existing = column,
            None => columns.push(column),
        }
        CleanTable::new(columns)
    }

    /// The value at (row, column name).
    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        self.column(name).and_then(|column| column.values.get(row))
    }

    /// A new table holding only the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> CleanTable {
        let columns = self
            .columns
            .iter()
            .map(|column| Column {
                name: column.name.clone(),
                kind: column.kind,
                values: rows
                    .iter()
                    .filter_map(|row| column.values.get(*row).cloned())
                    .collect(),
            })
            .collect();
        CleanTable::new(columns)
    }

    /// Row-wise concatenation with outer-join-on-columns semantics: column order follows
    /// first appearance, and rows from a table lacking a column read as missing there.
    /// A column whose tag differs between tables is re-derived as text unless every table
    /// typed it numeric.
    pub fn concat(tables: Vec<CleanTable>, categorical_max_unique: usize) -> CleanTable {
        let total: usize = tables.iter().map(CleanTable::row_count).sum();
        let mut merged: Vec<Column> = Vec::new();
        let mut offset = 0usize;
        for table in tables {
            let rows = table.rows;
            for column in table.columns {
                let target = match merged.iter().position(|existing| existing.name == column.name) {
                    Some(index) => index,
                    None => {
                        merged.push(Column::new(column.name.clone(), column.kind, vec![Value::Missing; total]));
                        merged.len() - 1
                    }
                };
                let existing = &mut merged[target];
                if existing.kind != column.kind {
                    existing.kind = ColumnType::Text;
                }
                for (index, value) in column.values.into_iter().enumerate() {
                    existing.values[offset + index] = value;
                }
            }
            offset += rows;
        }
        // Non-numeric tags depend on the merged cardinality
        for column in merged.iter_mut().filter(|column| !column.kind.is_numeric()) {
            column.demote_to_text(categorical_max_unique);
        }
        CleanTable::new(merged)
    }

    /// Distinct values for categorical columns and ranges for numeric ones, computed on demand.
    pub fn filter_surface(&self) -> FilterSurface {
        let mut surface = FilterSurface::default();
        for column in &self.columns {
            match column.kind {
                ColumnType::Categorical => {
                    surface
                        .categorical
                        .push((column.name.clone(), column.distinct().into_iter().collect()));
                }
                ColumnType::Numeric => {
                    let range = column.numbers().fold(None, |range: Option<(f64, f64)>, number| {
                        Some(match range {
                            Some((min, max)) => (min.min(number), max.max(number)),
                            None => (number, number),
                        })
                    });
                    if let Some(range) = range {
                        surface.numeric.push((column.name.clone(), range));
                    }
                }
                ColumnType::Text => (),
            }
        }
        surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(values: &[&str]) -> Vec<Value> {
        values
            .iter()
            .map(|value| if value.is_empty() { Value::Missing } else { Value::Text(value.to_string()) })
            .collect()
    }

    fn numbers(values: &[f64]) -> Vec<Value> {
        values.iter().map(|value| Value::Number(*value)).collect()
    }

    #[test]
    fn concat_outer_joins_columns() {
        let first = CleanTable::new(vec![
            Column::new("Respondent", ColumnType::Categorical, text(&["R1", "R2"])),
            Column::new("Age (Years)", ColumnType::Numeric, numbers(&[25.0, 31.0])),
        ]);
        let second = CleanTable::new(vec![
            Column::new("Respondent", ColumnType::Categorical, text(&["R3"])),
            Column::new("Company", ColumnType::Categorical, text(&["A"])),
        ]);
        let table = CleanTable::concat(vec![first, second], 50);

        assert_eq!(table.row_count(), 3);
        assert_eq!(table.names(), vec!["Respondent", "Age (Years)", "Company"]);
        assert_eq!(table.value(2, "Age (Years)"), Some(&Value::Missing));
        assert_eq!(table.value(0, "Company"), Some(&Value::Missing));
        assert_eq!(table.value(2, "Company"), Some(&Value::Text("A".to_owned())));
        assert_eq!(table.column("Age (Years)").unwrap().kind, ColumnType::Numeric);
    }

    #[test]
    fn concat_conflicting_types_degrades_to_text() {
        let first = CleanTable::new(vec![Column::new("Q", ColumnType::Numeric, numbers(&[1.0]))]);
        let second = CleanTable::new(vec![Column::new("Q", ColumnType::Categorical, text(&["x"]))]);
        let table = CleanTable::concat(vec![first, second], 50);
        let column = table.column("Q").unwrap();

        assert_eq!(column.kind, ColumnType::Categorical);
        assert_eq!(column.values, text(&["1", "x"]));
    }

    #[test]
    fn filter_surface_lists_values_and_ranges() {
        let table = CleanTable::new(vec![
            Column::new("Company", ColumnType::Categorical, text(&["B", "A", "B", ""])),
            Column::new("Age (Years)", ColumnType::Numeric, vec![
                Value::Number(40.0),
                Value::Missing,
                Value::Number(25.0),
                Value::Number(31.0),
            ]),
            Column::new("Notes", ColumnType::Text, text(&["x", "y", "z", "w"])),
        ]);
        let surface = table.filter_surface();

        assert_eq!(surface.categorical, vec![("Company".to_owned(), vec!["A".to_owned(), "B".to_owned()])]);
        assert_eq!(surface.numeric, vec![("Age (Years)".to_owned(), (25.0, 40.0))]);
    }

    #[test]
    fn select_rows_copies() {
        let table = CleanTable::new(vec![Column::new("Q", ColumnType::Numeric, numbers(&[1.0, 2.0, 3.0]))]);
        let subset = table.select_rows(&[2, 0]);

        assert_eq!(subset.row_count(), 2);
        assert_eq!(subset.column("Q").unwrap().values, numbers(&[3.0, 1.0]));
        assert_eq!(table.row_count(), 3);
    }
}
