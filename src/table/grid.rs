//! Untyped 2-D grid produced by the loaders, before any header interpretation.

use std::borrow::Cow;
use std::fmt::Display;

/// A single raw value from a source sheet.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum GridCell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

static EMPTY: GridCell = GridCell::Empty;

impl GridCell {
    /// Text as read, numbers rendered the way a spreadsheet shows them.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            GridCell::Empty => Cow::Borrowed(""),
            GridCell::Text(text) => Cow::Borrowed(text),
            GridCell::Number(number) => Cow::Owned(format_number(*number)),
        }
    }

    /// True for empty cells, whitespace-only text and any of the `nulls` literals
    /// (compared case-insensitively after trimming).
    pub fn is_blank(&self, nulls: &[String]) -> bool {
        match self {
            GridCell::Empty => true,
            GridCell::Text(text) => is_blank_text(text, nulls),
            GridCell::Number(number) => number.is_nan(),
        }
    }

    /// Numeric interpretation of the cell, `None` when it does not parse.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            GridCell::Number(number) if number.is_finite() => Some(*number),
            GridCell::Text(text) => parse_number(text),
            _ => None,
        }
    }
}

impl Display for GridCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_text())
    }
}

/// Blank-check for text values shared by every pipeline stage.
pub fn is_blank_text(text: &str, nulls: &[String]) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || nulls.iter().any(|null| null.eq_ignore_ascii_case(trimmed))
}

/// Parses a trimmed decimal/scientific literal; infinities and NaN are rejected.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|number| number.is_finite())
}

/// Renders integral values without a fractional part ("25" rather than "25.0").
pub fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

/// Ordered rows of cells, padded to a rectangle. Immutable once built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawGrid {
    rows: Vec<Vec<GridCell>>,
    width: usize,
}

impl RawGrid {
    /// Builds a grid, padding short rows with empty cells.
    pub fn new(mut rows: Vec<Vec<GridCell>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, GridCell::Empty);
        }
        RawGrid { rows, width }
    }

    /// Convenience constructor used heavily by tests and small hosts: every string that
    /// parses as a number becomes a numeric cell, empty strings become empty cells.
    pub fn from_strings<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        RawGrid::new(
            rows.into_iter()
                .map(|row| row.into_iter().map(|value| widen(value.as_ref())).collect())
                .collect(),
        )
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.rows.is_empty()
    }

    /// Cell at (row, col); out-of-range positions read as empty.
    pub fn get(&self, row: usize, col: usize) -> &GridCell {
        self.rows.get(row).and_then(|cells| cells.get(col)).unwrap_or(&EMPTY)
    }

    /// Trimmed text at (row, col), with null literals mapped to "".
    pub fn text(&self, row: usize, col: usize, nulls: &[String]) -> String {
        let cell = self.get(row, col);
        if cell.is_blank(nulls) {
            String::new()
        } else {
            cell.as_text().trim().to_owned()
        }
    }

    pub fn row(&self, row: usize) -> Option<&[GridCell]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[GridCell]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

/// Type-widens a delimited-text field into a cell.
pub(crate) fn widen(value: &str) -> GridCell {
    if value.is_empty() {
        GridCell::Empty
    } else if let Some(number) = parse_number(value) {
        GridCell::Number(number)
    } else {
        GridCell::Text(value.to_owned())
    }
}
