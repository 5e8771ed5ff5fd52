use crate::config::ConfigError;
use crate::config::PipelineConfig;
use crate::spreadsheet::sheet::SheetBounds;
use glob::Pattern;

/// Criteria for selecting sheets and bounding the read.
#[derive(Clone, Debug, Default)]
pub(crate) struct Criteria {
    /// Sheet name patterns for filtering which sheets to process.
    pub(crate) sheet_name_patterns: Option<Vec<Pattern>>,

    /// Maximum number of sheets to read.
    pub(crate) sheet_limit: Option<usize>,

    /// Maximum number of rows to read per sheet.
    pub(crate) rows_limit: Option<usize>,

    /// Cells at or past this column are ignored.
    pub(crate) cols_limit: Option<usize>,

    /// Largest dense grid (rows times columns) a sheet may produce.
    pub(crate) cells_limit: Option<usize>,

    /// Windows code page for delimited text that is not UTF-8.
    pub(crate) codepage: u16,
}

impl Criteria {
    pub(crate) fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        Ok(Criteria {
            sheet_name_patterns: config.sheet_patterns()?,
            sheet_limit: config.sheet_limit,
            rows_limit: config.max_rows,
            cols_limit: Some(config.max_cols),
            cells_limit: Some(config.max_cells),
            codepage: config.csv_codepage,
        })
    }

    pub(crate) fn sheet_bounds(&self) -> SheetBounds {
        SheetBounds {
            rows: self.rows_limit,
            cols: self.cols_limit,
            cells: self.cells_limit,
        }
    }

    /// Checks if a sheet name matches the criteria patterns.
    /// Returns true if no patterns are specified or if name matches any pattern.
    pub(crate) fn accept(&self, sheet_name: &str) -> bool {
        if let Some(patterns) = &self.sheet_name_patterns {
            patterns.iter().any(|pattern| pattern.matches(sheet_name))
        } else {
            true
        }
    }

    /// Accepted sheet names in workbook order, honoring the sheet limit.
    pub(crate) fn select(&self, sheet_names: &[String]) -> Vec<String> {
        sheet_names
            .iter()
            .filter(|name| self.accept(name))
            .take(self.sheet_limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_by_pattern_and_limit() {
        let criteria = Criteria {
            sheet_name_patterns: Some(vec![Pattern::new("Wave*").unwrap()]),
            sheet_limit: Some(2),
            ..Criteria::default()
        };
        let names = ["Wave 1", "Summary", "Wave 2", "Wave 3"].map(String::from);

        assert_eq!(criteria.select(&names), vec!["Wave 1".to_owned(), "Wave 2".to_owned()]);
        assert!(!criteria.accept("Summary"));
    }

    #[test]
    fn accept_everything_without_patterns() {
        let criteria = Criteria::default();
        assert!(criteria.accept("anything"));
    }
}
