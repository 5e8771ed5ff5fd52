//! Data-Region Extractor: finds where respondent rows begin and slices them out of the grid.

use crate::config::DataStart;
use crate::config::HeaderLayout;
use crate::pipeline::PipelineError;
use crate::table::grid::GridCell;
use crate::table::grid::RawGrid;

/// One named column of the data region, still untyped.
#[derive(Clone, Debug, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub cells: Vec<GridCell>,
}

/// The data rows of a sheet, column-major, with fully blank rows removed.
#[derive(Clone, Debug, PartialEq)]
pub struct DataRegion {
    pub columns: Vec<RawColumn>,
    /// Absolute grid row where data starts
    pub start_row: usize,
    pub rows: usize,
    pub warnings: Vec<String>,
}

/// Locates the first data row for `layout`, with a warning when a fallback offset was used.
pub fn locate_data_start(
    grid: &RawGrid,
    layout: &HeaderLayout,
    nulls: &[String],
) -> Result<(usize, Option<String>), PipelineError> {
    let first_candidate = layout.last_header_row().map(|row| row + 1).unwrap_or(0);
    match &layout.data_start {
        DataStart::FixedOffset { row } => Ok((*row, None)),
        DataStart::Sentinel {
            token,
            max_rows,
            max_cols,
            fallback_offset,
        } => {
            let needle = token.to_lowercase();
            let found = (first_candidate..(*max_rows).min(grid.height())).find(|row| {
                (0..(*max_cols).min(grid.width()))
                    .any(|col| grid.text(*row, col, nulls).to_lowercase().contains(&needle))
            });
            match (found, fallback_offset) {
                (Some(row), _) => Ok((row, None)),
                (None, Some(offset)) => Ok((
                    *offset,
                    Some(format!("sentinel '{token}' not found, used fixed offset row {offset}")),
                )),
                (None, None) => Err(PipelineError::HeaderNotFound(format!(
                    "no cell containing '{token}' in rows {first_candidate}..{max_rows}, columns 0..{max_cols}"
                ))),
            }
        }
    }
}

/// Slices the data rows starting at the located row, applies `names` and drops rows that
/// are blank in every column.
pub fn extract_region(
    grid: &RawGrid,
    layout: &HeaderLayout,
    names: &[String],
    nulls: &[String],
) -> Result<DataRegion, PipelineError> {
    let (start_row, warning) = locate_data_start(grid, layout, nulls)?;
    let width = grid.width().min(names.len());
    if width == 0 {
        return Err(PipelineError::EmptyDataset("sheet has no columns".to_owned()));
    }
    let rows: Vec<&[GridCell]> = grid
        .rows()
        .skip(start_row)
        .filter(|row| row.iter().take(width).any(|cell| !cell.is_blank(nulls)))
        .collect();
    if rows.is_empty() {
        return Err(PipelineError::EmptyDataset(format!("no data rows from row {start_row}")));
    }
    let columns = names
        .iter()
        .take(width)
        .enumerate()
        .map(|(col, name)| RawColumn {
            name: name.to_owned(),
            cells: rows.iter().map(|row| row[col].clone()).collect(),
        })
        .collect();
    Ok(DataRegion {
        columns,
        start_row,
        rows: rows.len(),
        warnings: warning.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nulls() -> Vec<String> {
        vec!["nan".to_owned()]
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn survey() -> RawGrid {
        RawGrid::from_strings(vec![
            vec!["", "Age", "Company"],
            vec!["", "", ""],
            vec!["", "Years", "Name"],
            vec!["Respondent 1", "25", "A"],
            vec!["", "", "nan"],
            vec!["Respondent 2", "31", "B"],
        ])
    }

    #[test]
    fn sentinel_marks_first_data_row() {
        let layout = HeaderLayout::sentinel(vec![0, 2], "respondent");
        let region = extract_region(&survey(), &layout, &names(&["Respondent", "Age", "Company"]), &nulls()).unwrap();

        assert_eq!(region.start_row, 3);
        assert_eq!(region.rows, 2);
        assert_eq!(region.columns[1].cells, vec![GridCell::Number(25.0), GridCell::Number(31.0)]);
        assert!(region.warnings.is_empty());
    }

    #[test]
    fn sentinel_is_searched_after_header_rows_only() {
        let grid = RawGrid::from_strings(vec![vec!["Respondent"], vec!["x"], vec!["y"]]);
        let layout = HeaderLayout::sentinel(vec![0], "Respondent");
        assert!(matches!(locate_data_start(&grid, &layout, &nulls()), Err(PipelineError::HeaderNotFound(_))));
    }

    #[test]
    fn sentinel_outside_window_is_not_found() {
        let mut rows = vec![vec!["h", "", "", "", "", ""]];
        rows.extend((0..12).map(|_| vec!["x", "", "", "", "", ""]));
        rows[3][5] = "Respondent";
        rows[11][0] = "Respondent";
        let grid = RawGrid::from_strings(rows);
        let layout = HeaderLayout::sentinel(vec![0], "Respondent");
        assert!(matches!(locate_data_start(&grid, &layout, &nulls()), Err(PipelineError::HeaderNotFound(_))));
    }

    #[test]
    fn missing_sentinel_uses_fallback_offset() {
        let grid = RawGrid::from_strings(vec![vec!["Age"], vec!["25"], vec!["31"]]);
        let layout = HeaderLayout {
            header_rows: vec![0],
            data_start: DataStart::Sentinel {
                token: "Respondent".to_owned(),
                max_rows: 10,
                max_cols: 5,
                fallback_offset: Some(1),
            },
        };
        let region = extract_region(&grid, &layout, &names(&["Age"]), &nulls()).unwrap();
        assert_eq!(region.rows, 2);
        assert_eq!(region.warnings.len(), 1);
    }

    #[test]
    fn fixed_offset_past_the_end_is_empty() {
        let layout = HeaderLayout::fixed(vec![0, 2], 40);
        let result = extract_region(&survey(), &layout, &names(&["a", "b", "c"]), &nulls());
        assert!(matches!(result, Err(PipelineError::EmptyDataset(_))));
    }

    #[test]
    fn empty_grid_is_empty_dataset() {
        let layout = HeaderLayout::fixed(vec![0], 1);
        let result = extract_region(&RawGrid::default(), &layout, &[], &nulls());
        assert!(matches!(result, Err(PipelineError::EmptyDataset(_))));
    }
}
