//! # Raw Grid Loader
//!
//! Reads Excel (`.xlsx`, `.xlsm`, `.xlam`), OpenDocument (`.ods`) and delimited text files
//! into untyped [`RawGrid`]s, one per sheet, without interpreting any header row.
//! Sources are opened from a path or from an in-memory buffer; the format comes from the
//! file extension when there is one and from the leading bytes otherwise.

pub(crate) mod cell;
pub(crate) mod criteria;
pub(crate) mod delimited;
pub(crate) mod excel;
pub mod ods;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod xlsx;

use crate::error::RustySurveyError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::zip::ZipHelper;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::delimited::DelimitedSpreadsheet;
use crate::spreadsheet::ods::OdsSpreadsheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use crate::table::grid::RawGrid;
use std::path::Path;
use thiserror::Error;
use zip::ZipArchive;

/// ZIP local file header signature
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";
/// OLE compound file signature (legacy .xls and encrypted OOXML packages)
const CFB_SIGNATURE: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";

/// Errors raised while locating sheets and parts of a workbook.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Unsupported spreadsheet format: {0}")]
    UnsupportedFormat(String),

    #[error("Spreadsheet '{0}' is password protected")]
    PasswordProtected(String),

    #[error("Spreadsheet '{0}' contains no sheets")]
    EmptySpreadsheet(String),

    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    #[error("Missing workbook part '{0}'")]
    FileError(String),

    #[error("Sheet '{sheet}' spans {rows} rows by {cols} columns, more than {limit} cells; set max_rows to read it")]
    SheetTooLarge {
        sheet: String,
        rows: usize,
        cols: usize,
        limit: usize,
    },
}

/// Container formats the loader understands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    Xlsx,
    Ods,
    Delimited,
}

impl SourceFormat {
    /// Format implied by a file extension, `None` for unknown extensions.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "xlsx" | "xlsm" | "xlam" => Some(SourceFormat::Xlsx),
            "ods" => Some(SourceFormat::Ods),
            "csv" | "tsv" | "tab" | "txt" => Some(SourceFormat::Delimited),
            _ => None,
        }
    }

    /// Format detected from the content's leading bytes.
    fn sniff(reader: &mut UnifiedReader) -> Result<Self, RustySurveyError> {
        let prefix = reader.peek_prefix(CFB_SIGNATURE.len())?;
        if prefix.starts_with(CFB_SIGNATURE) {
            Err(SpreadsheetError::UnsupportedFormat("legacy or encrypted workbook".to_owned()))?
        }
        if !prefix.starts_with(ZIP_SIGNATURE) {
            return Ok(SourceFormat::Delimited);
        }
        let mut zip = ZipArchive::new(&mut *reader)?;
        let is_ods = zip
            .read_bytes("mimetype")?
            .map(|mime| mime.trim_ascii() == ods::MIME_TYPE)
            .unwrap_or(false);
        Ok(if is_ods { SourceFormat::Ods } else { SourceFormat::Xlsx })
    }
}

/// A source of sheets, each readable as a raw grid.
pub(crate) trait Spreadsheet {
    /// Display name of the source (file name or upload name)
    fn name(&self) -> String;

    /// Sheet names in workbook order
    fn sheet_names(&self) -> Vec<String>;

    /// Reads one sheet into an untyped grid anchored at the first row and column
    fn read_grid(&mut self, sheet_name: &str) -> Result<RawGrid, RustySurveyError>;
}

/// Opens a local file.
pub(crate) fn open_path(path: &Path, criteria: &Criteria) -> Result<Box<dyn Spreadsheet>, RustySurveyError> {
    let mut reader = UnifiedReader::open(path)?;
    let format = match SourceFormat::from_extension(path) {
        Some(format) => format,
        None => SourceFormat::sniff(&mut reader)?,
    };
    if format != SourceFormat::Delimited && reader.peek_prefix(CFB_SIGNATURE.len())?.starts_with(CFB_SIGNATURE) {
        Err(SpreadsheetError::PasswordProtected(path.display().to_string()))?
    }
    open_reader(&path.display().to_string(), reader, format, criteria)
}

/// Opens an in-memory buffer; `name` is used for diagnostics and the sheet name of delimited text.
pub(crate) fn open_bytes(name: &str, bytes: Vec<u8>, criteria: &Criteria) -> Result<Box<dyn Spreadsheet>, RustySurveyError> {
    let mut reader = UnifiedReader::from_bytes(bytes);
    let format = SourceFormat::sniff(&mut reader)?;
    open_reader(name, reader, format, criteria)
}

fn open_reader(
    name: &str,
    reader: UnifiedReader,
    format: SourceFormat,
    criteria: &Criteria,
) -> Result<Box<dyn Spreadsheet>, RustySurveyError> {
    let spreadsheet: Box<dyn Spreadsheet> = match format {
        SourceFormat::Xlsx => Box::new(XlsxSpreadsheet::open(name, reader, criteria)?),
        SourceFormat::Ods => Box::new(OdsSpreadsheet::open(name, reader, criteria)?),
        SourceFormat::Delimited => Box::new(DelimitedSpreadsheet::open(name, reader, criteria)?),
    };
    Ok(spreadsheet)
}
