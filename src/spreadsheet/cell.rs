use crate::error::RustySurveyError;
use crate::table::grid::GridCell;
use chrono::Duration;
use chrono::NaiveDate;
use iso8601_duration::Duration as IsoDuration;

/// Types of cell data in spreadsheet files.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values (true/false)
    Boolean,
    /// Numeric values
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// Time values stored as day fractions
    NumberTime,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// ISO 8601 duration strings
    IsoDuration,
    /// Inline string values
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values (#N/A, #DIV/0!), read as empty
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(Self::NumberTime),
            _ => None,
        }
    }

    /// Analyzes format codes for date/time patterns.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_date = false;
        let mut is_time = false;
        let mut is_color = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' if !is_escaped => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_literal && !is_color => is_literal = true,

                ']' if is_color => is_color = false,
                '[' if !is_color && !is_literal => is_color = true,
                _ if is_literal || is_color => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, _) => Self::NumberTime,
            (false, false, _) => Self::Number,
        }
    }
}

/// Represents a single cell in a spreadsheet with position, type, and value.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    /// Cell data type
    pub(crate) kind: CellType,
    /// Cell value as string
    pub(crate) value: String,
}

impl Cell {
    /// Widens the stored value into a grid cell.
    ///
    /// Dates and times become ISO text, booleans `true`/`false`. A value that does not
    /// match its declared type is kept as text rather than failing the sheet.
    pub(crate) fn to_grid_cell(&self) -> GridCell {
        let rendered = match self.kind {
            CellType::Empty | CellType::Error => return GridCell::Empty,
            CellType::Boolean => Ok(if self.value == "1" || self.value == "true" { "true" } else { "false" }.to_owned()),
            CellType::Number => {
                return match self.value.trim().parse::<f64>() {
                    Ok(number) if number.is_finite() => GridCell::Number(number),
                    _ => GridCell::Text(self.value.to_owned()),
                }
            }
            CellType::NumberDateTime1900 => to_datetime_string(&self.value, false),
            CellType::NumberDate1900 => to_date_string(&self.value, false),
            CellType::NumberDateTime1904 => to_datetime_string(&self.value, true),
            CellType::NumberDate1904 => to_date_string(&self.value, true),
            CellType::NumberTime => to_time_string(&self.value),
            CellType::IsoDateTime => Ok(self.value.replace('T', " ")),
            CellType::IsoDuration => to_duration_string(&self.value),
            CellType::InlineString | CellType::SharedString => Ok(self.value.to_owned()),
        };
        GridCell::Text(rendered.unwrap_or_else(|_| self.value.to_owned()))
    }
}

/// Converts Excel numeric date to ISO date string.
/// Handles Lotus 1-2-3 leap year bug for 1900 epoch.
fn to_date_string(value: &str, is_1904: bool) -> Result<String, RustySurveyError> {
    let days = value.trim().parse::<f64>()?.trunc() as i64;
    let duration = Duration::try_days(
        days + if is_1904 {
            1462
        } else if days < 60 {
            1
        } else {
            0
        },
    )
    .ok_or_else(|| RustySurveyError::WithContextError(format!("Date serial '{value}' out of range")))?;
    let date = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|epoch| epoch.checked_add_signed(duration))
        .ok_or_else(|| RustySurveyError::WithContextError(format!("Date serial '{value}' out of range")))?;
    Ok(date.format("%Y-%m-%d").to_string())
}

/// Converts Excel numeric time (day fraction) to ISO time string.
fn to_time_string(value: &str) -> Result<String, RustySurveyError> {
    let factor = value.trim().parse::<f64>()?.fract();
    let mut hours = (factor * 86_400_000f64).round() as i64;
    let milliseconds = hours % 1_000; hours /= 1_000;
    let seconds = hours % 60; hours /= 60;
    let minutes = hours % 60; hours /= 60;
    let timestamp = if milliseconds > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    };
    Ok(timestamp)
}

/// Converts Excel numeric datetime to ISO datetime string.
fn to_datetime_string(value: &str, is_1904: bool) -> Result<String, RustySurveyError> {
    let date = to_date_string(value, is_1904)?;
    let time = to_time_string(value)?;
    Ok(format!("{date} {time}"))
}

/// Renders an ISO 8601 duration (`PT8H30M`) as `HH:MM:SS`.
fn to_duration_string(value: &str) -> Result<String, RustySurveyError> {
    let duration = value
        .parse::<IsoDuration>()
        .map_err(|_| RustySurveyError::WithContextError(format!("Invalid ISO 8601 duration '{value}'")))?;
    let hours = (duration.day * 24.0 + duration.hour) as i64;
    let minutes = duration.minute as i64;
    let seconds = duration.second as i64;
    Ok(format!("{hours:02}:{minutes:02}:{seconds:02}"))
}
