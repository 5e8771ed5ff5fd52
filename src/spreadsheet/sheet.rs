use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::SpreadsheetError;
use crate::table::grid::GridCell;
use crate::table::grid::RawGrid;

/// Limits on how much of a worksheet is materialized; `None` means unbounded.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SheetBounds {
    pub(crate) rows: Option<usize>,
    pub(crate) cols: Option<usize>,
    pub(crate) cells: Option<usize>,
}

/// Cells collected from one worksheet, in reading order.
pub(crate) struct Sheet {
    /// Sheet name
    pub(crate) name: String,
    /// Non-empty cells
    pub(crate) cells: Vec<Cell>,
    bounds: SheetBounds,
    /// Actual data range (determined from cell data)
    pub(crate) row_upper_bound: Option<usize>,
    pub(crate) col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(crate) fn new(name: &str, bounds: SheetBounds) -> Self {
        Self {
            name: name.to_owned(),
            cells: Vec::new(),
            bounds,
            row_upper_bound: None,
            col_upper_bound: None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Checks if a row lies beyond the row limit (rows are counted from the sheet top,
    /// header rows included).
    pub(crate) fn after_row_upper_bound(&self, row: usize) -> bool {
        self.bounds.rows.map(|limit| limit <= row).unwrap_or(false)
    }

    pub(crate) fn after_col_upper_bound(&self, col: usize) -> bool {
        self.bounds.cols.map(|limit| limit <= col).unwrap_or(false)
    }

    /// True once more cells were collected than the cell limit allows; `to_grid` will refuse
    /// such a sheet, so readers can stop expanding repeats early.
    pub(crate) fn is_full(&self) -> bool {
        self.bounds.cells.map(|limit| self.cells.len() > limit).unwrap_or(false)
    }

    /// Adds a cell, updating the data range. Cells beyond the column limit are ignored.
    pub(crate) fn push(&mut self, cell: Cell) {
        if self.after_col_upper_bound(cell.col) {
            return;
        }
        if self.row_upper_bound.map(|bound| bound < cell.row).unwrap_or(true) {
            self.row_upper_bound = Some(cell.row);
        }
        if self.col_upper_bound.map(|bound| bound < cell.col).unwrap_or(true) {
            self.col_upper_bound = Some(cell.col);
        }
        self.cells.push(cell);
    }

    /// Lays the cells out as a rectangle anchored at A1, so row indexes stay absolute.
    /// Later duplicates of a position win. A rectangle larger than the cell limit is
    /// refused before anything is allocated.
    pub(crate) fn to_grid(&self) -> Result<RawGrid, SpreadsheetError> {
        let (rows, cols) = match self.row_upper_bound.zip(self.col_upper_bound) {
            Some((row, col)) => (row + 1, col + 1),
            None => return Ok(RawGrid::default()),
        };
        if let Some(limit) = self.bounds.cells {
            if rows.saturating_mul(cols) > limit {
                return Err(SpreadsheetError::SheetTooLarge {
                    sheet: self.name.to_owned(),
                    rows,
                    cols,
                    limit,
                });
            }
        }
        let mut grid = vec![vec![GridCell::Empty; cols]; rows];
        for cell in &self.cells {
            grid[cell.row][cell.col] = cell.to_grid_cell();
        }
        Ok(RawGrid::new(grid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::CellType;

    fn push(sheet: &mut Sheet, row: usize, col: usize, value: &str) {
        sheet.push(Cell {
            row,
            col,
            kind: CellType::InlineString,
            value: value.to_owned(),
        });
    }

    #[test]
    fn sheet_initial() {
        let sheet = Sheet::new("Sheet1", SheetBounds::default());

        assert!(sheet.is_empty());
        assert_eq!(sheet.row_upper_bound, None);
        assert_eq!(sheet.col_upper_bound, None);
        assert!(sheet.to_grid().unwrap().is_empty());
    }

    #[test]
    fn sheet_grid_is_anchored_at_origin() {
        let mut sheet = Sheet::new("Sheet1", SheetBounds::default());
        push(&mut sheet, 1, 1, "b2");
        push(&mut sheet, 3, 2, "c4");
        let grid = sheet.to_grid().unwrap();

        assert_eq!(grid.height(), 4);
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.get(0, 0), &GridCell::Empty);
        assert_eq!(grid.get(1, 1), &GridCell::Text("b2".to_owned()));
        assert_eq!(grid.get(3, 2), &GridCell::Text("c4".to_owned()));
    }

    #[test]
    fn sheet_row_limit() {
        let bounds = SheetBounds {
            rows: Some(5),
            ..SheetBounds::default()
        };
        let sheet = Sheet::new("Sheet1", bounds);

        assert!(!sheet.after_row_upper_bound(4));
        assert!(sheet.after_row_upper_bound(5));
    }

    #[test]
    fn cells_beyond_the_column_limit_are_ignored() {
        let bounds = SheetBounds {
            cols: Some(3),
            ..SheetBounds::default()
        };
        let mut sheet = Sheet::new("Sheet1", bounds);
        push(&mut sheet, 0, 0, "a1");
        push(&mut sheet, 0, 16383, "xfd1");
        let grid = sheet.to_grid().unwrap();

        assert_eq!(grid.width(), 1);
        assert_eq!(grid.get(0, 0), &GridCell::Text("a1".to_owned()));
    }

    #[test]
    fn stray_far_cell_is_refused_without_allocating() {
        let bounds = SheetBounds {
            cells: Some(1_000),
            ..SheetBounds::default()
        };
        let mut sheet = Sheet::new("Sheet1", bounds);
        push(&mut sheet, 0, 0, "a1");
        push(&mut sheet, 1_048_575, 16_383, "stray");

        let error = sheet.to_grid().unwrap_err();
        assert!(matches!(
            error,
            SpreadsheetError::SheetTooLarge { rows: 1_048_576, cols: 16_384, limit: 1_000, .. }
        ));
    }
}
