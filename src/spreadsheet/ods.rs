use crate::error::RustySurveyError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use crate::table::grid::RawGrid;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::io::Read;
use std::io::Seek;
use thiserror::Error;
use zip::ZipArchive;

/// ODS file MIME type identifier
pub(crate) const MIME_TYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";
/// XML element name for spreadsheet root
const SPREADSHEET: QName = QName(b"office:spreadsheet");
/// XML element name for table (sheet)
const TABLE: QName = QName(b"table:table");
/// XML element name for table row
const TABLE_ROW: QName = QName(b"table:table-row");
/// XML element name for table cell
const TABLE_CELL: QName = QName(b"table:table-cell");
/// XML element name for covered table cell (merged cells)
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
/// XML element name for annotations (comments)
const ANNOTATION: QName = QName(b"office:annotation");
/// XML element name for paragraph text
const PARAGRAPH: QName = QName(b"text:p");
/// XML element name for string (space) text
const STRING: QName = QName(b"text:s");

/// Error types specific to ODS spreadsheet processing
#[derive(Error, Debug)]
pub enum OdsError {
    /// Invalid ODS MIME type detected in file
    #[error("Invalid ODS MIME type")]
    MimeTypeError,

    #[error("Table without a name")]
    UnnamedTable,
}

/// OpenDocument spreadsheet; `content.xml` is parsed once at open time
pub(crate) struct OdsSpreadsheet {
    /// Display name of the source
    name: String,
    /// Accepted sheets in document order
    sheets: Vec<Sheet>,
}

impl OdsSpreadsheet {
    /// Opens an ODS document, validates its format and reads the accepted tables
    pub(crate) fn open(name: &str, reader: UnifiedReader, criteria: &Criteria) -> Result<Self, RustySurveyError> {
        let mut zip = ZipArchive::new(reader)?;
        check_mime(&mut zip)?;
        if is_password_protected(&mut zip)? {
            Err(SpreadsheetError::PasswordProtected(name.to_owned()))?;
        }
        let sheets = read_sheets(&mut zip, criteria)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::EmptySpreadsheet(name.to_owned()))?
        }
        Ok(OdsSpreadsheet {
            name: name.to_owned(),
            sheets,
        })
    }
}

impl Spreadsheet for OdsSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|sheet| sheet.name.to_owned()).collect()
    }

    fn read_grid(&mut self, sheet_name: &str) -> Result<RawGrid, RustySurveyError> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name == sheet_name)
            .ok_or_else(|| SpreadsheetError::SheetNotFound(sheet_name.to_owned()))?
            .to_grid()
            .map_err(Into::into)
    }
}

/// Reads the accepted tables of `content.xml`
fn read_sheets<RS: Read + Seek>(zip: &mut ZipArchive<RS>, criteria: &Criteria) -> Result<Vec<Sheet>, RustySurveyError> {
    let mut sheets = Vec::<Sheet>::new();
    let mut sheet_count = 0usize;
    let mut sheet_name = String::new();
    let mut reader = zip
        .xml_reader("content.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("content.xml".to_owned()))?;
    'sheets: loop {
        let mut found = false;
        match_xml_events!(reader => {
            Event::End(event) if event.name() == SPREADSHEET => break 'sheets,
            Event::Start(event) if event.name() == TABLE => {
                let table_name = event.get_attribute_value("table:name")?.ok_or(OdsError::UnnamedTable)?;
                sheet_name.clear();
                sheet_name.push_str(&table_name);
                if criteria.sheet_limit.map(|limit| sheet_count >= limit).unwrap_or(false) {
                    break 'sheets;
                } else if criteria.accept(&sheet_name) {
                    sheet_count += 1;
                    found = true;
                    break;
                }
            }
        });
        if !found {
            break;
        }
        let mut sheet = Sheet::new(&sheet_name, criteria.sheet_bounds());

        // Cell state
        let mut row = 0usize;
        let mut col = 0usize;
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        // Parsing context
        let mut element_context = false; // reading paragraph children
        let mut comment_context = false; // inside an annotation
        let mut paragraphs = 0usize;
        match_xml_events!(reader => {
            Event::End(event) if event.name() == TABLE => break,
            Event::Start(event) if event.name() == TABLE_ROW => {
                row_count = event.parse_attribute_value("table:number-rows-repeated")?.unwrap_or(1);
                col = 0;
            }
            Event::End(event) if event.name() == TABLE_ROW => {
                row += row_count;
            }
            Event::Start(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                value.clear();
                paragraphs = 0;
                col_count = event.parse_attribute_value::<usize>("table:number-columns-repeated")?.unwrap_or(1);
                let is_error = event.get_attribute_value("calcext:value-type")?.map(|cow| cow == "error").unwrap_or(false);
                kind = match event.get_attribute_value("office:value-type")? {
                    None => CellType::Empty,
                    Some(_) if is_error => CellType::Error,
                    Some(result_type) => match result_type.as_ref() {
                        "boolean" => CellType::Boolean,
                        "date" => CellType::IsoDateTime,
                        "time" => CellType::IsoDuration,
                        "string" => CellType::InlineString,
                        _ => CellType::Number,
                    },
                };
                let attribute = match kind {
                    CellType::Boolean => Some("office:boolean-value"),
                    CellType::IsoDateTime => Some("office:date-value"),
                    CellType::IsoDuration => Some("office:time-value"),
                    CellType::Number => Some("office:value"),
                    _ => None,
                };
                if let Some(attribute) = attribute {
                    if let Some(data) = event.get_attribute_value(attribute)? {
                        value.push_str(&data);
                    }
                }
                element_context = kind == CellType::InlineString;
            }
            Event::End(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                if kind != CellType::Empty && kind != CellType::Error && !value.is_empty() {
                    'repeat: for row_offset in 0..row_count {
                        let row_number = row + row_offset;
                        if sheet.after_row_upper_bound(row_number) || sheet.is_full() {
                            break 'repeat;
                        }
                        for col_offset in 0..col_count {
                            if sheet.after_col_upper_bound(col + col_offset) {
                                break;
                            }
                            sheet.push(Cell {
                                row: row_number,
                                col: col + col_offset,
                                kind,
                                value: value.to_owned(),
                            });
                        }
                    }
                }
                col += col_count;
                element_context = false;
                comment_context = false;
            }
            // String content
            Event::Start(event) if element_context && event.name() == ANNOTATION => comment_context = true,
            Event::End(event) if element_context && comment_context && event.name() == ANNOTATION => comment_context = false,
            Event::Start(event) if element_context && !comment_context && event.name() == PARAGRAPH => {
                if paragraphs > 0 {
                    value.push('\n');
                }
                paragraphs += 1;
            }
            Event::Start(event) if element_context && !comment_context && event.name() == STRING => {
                let count = event.parse_attribute_value("text:c")?.unwrap_or(1);
                for _ in 0..count {
                    value.push(' ');
                }
            }
            Event::Text(event) if element_context && !comment_context => value.push_bytes_text(&event)?,
            Event::GeneralRef(event) if element_context && !comment_context => value.push_bytes_ref(&event)?,
        });
        sheets.push(sheet);

        if criteria.sheet_limit.map(|limit| sheet_count >= limit).unwrap_or(false) {
            break;
        }
    }

    Ok(sheets)
}

/// Validates that the ZIP archive contains a valid ODS file by checking MIME type
fn check_mime<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<(), RustySurveyError> {
    if let Some(bytes) = zip.read_bytes("mimetype")? {
        if bytes.trim_ascii() != MIME_TYPE {
            Err(OdsError::MimeTypeError)?;
        }
    }
    Ok(())
}

/// Checks if the ODS file is password protected by examining the manifest
fn is_password_protected<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<bool, RustySurveyError> {
    let mut reader = match zip.xml_reader("META-INF/manifest.xml")? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = true,
        Event::End(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = false,
        Event::Start(event) if in_file_entry && event.name() == QName(b"manifest:encryption-data") => {
            return Ok(true);
        }
    });
    Ok(false)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::spreadsheet::xlsx::tests::workbook_bytes;
    use crate::table::grid::GridCell;

    pub(crate) const CONTENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" xmlns:calcext="urn:org:documentfoundation:names:experimental:calc:xmlns:calcext:1.0">
  <office:body>
    <office:spreadsheet>
      <table:table table:name="Wave 1">
        <table:table-row>
          <table:table-cell/>
          <table:table-cell office:value-type="string"><text:p>Age</text:p></table:table-cell>
          <table:table-cell office:value-type="string"><text:p>Shift</text:p><office:annotation><text:p>note</text:p></office:annotation></table:table-cell>
        </table:table-row>
        <table:table-row table:number-rows-repeated="2">
          <table:table-cell office:value-type="string" table:number-columns-repeated="2"><text:p>a<text:s text:c="2"/>b</text:p></table:table-cell>
          <table:table-cell office:value-type="time" office:time-value="PT8H30M0S"/>
        </table:table-row>
        <table:table-row>
          <table:table-cell office:value-type="float" office:value="25"/>
          <table:table-cell office:value-type="boolean" office:boolean-value="true"/>
          <table:table-cell office:value-type="string" calcext:value-type="error"><text:p>#DIV/0!</text:p></table:table-cell>
        </table:table-row>
      </table:table>
      <table:table table:name="Notes">
        <table:table-row>
          <table:table-cell office:value-type="string"><text:p>line one</text:p><text:p>line two</text:p></table:table-cell>
        </table:table-row>
      </table:table>
    </office:spreadsheet>
  </office:body>
</office:document-content>"#;

    pub(crate) fn document_bytes() -> Vec<u8> {
        workbook_bytes(&[
            ("mimetype", "application/vnd.oasis.opendocument.spreadsheet"),
            ("content.xml", CONTENT),
        ])
    }

    #[test]
    fn reads_every_table() {
        let mut document = OdsSpreadsheet::open("survey.ods", UnifiedReader::from_bytes(document_bytes()), &Criteria::default()).unwrap();
        assert_eq!(document.sheet_names(), vec!["Wave 1".to_owned(), "Notes".to_owned()]);

        let grid = document.read_grid("Wave 1").unwrap();
        assert_eq!(grid.height(), 4);
        assert_eq!(grid.get(0, 0), &GridCell::Empty);
        assert_eq!(grid.get(0, 2), &GridCell::Text("Shift".to_owned()));
        assert_eq!(grid.get(1, 0), &GridCell::Text("a  b".to_owned()));
        assert_eq!(grid.get(2, 1), &GridCell::Text("a  b".to_owned()));
        assert_eq!(grid.get(2, 2), &GridCell::Text("08:30:00".to_owned()));
        assert_eq!(grid.get(3, 0), &GridCell::Number(25.0));
        assert_eq!(grid.get(3, 1), &GridCell::Text("true".to_owned()));
        assert_eq!(grid.get(3, 2), &GridCell::Empty);

        let notes = document.read_grid("Notes").unwrap();
        assert_eq!(notes.get(0, 0), &GridCell::Text("line one\nline two".to_owned()));
    }

    #[test]
    fn honors_sheet_selection() {
        let criteria = Criteria {
            sheet_name_patterns: Some(vec![glob::Pattern::new("N*").unwrap()]),
            ..Criteria::default()
        };
        let document = OdsSpreadsheet::open("survey.ods", UnifiedReader::from_bytes(document_bytes()), &criteria).unwrap();
        assert_eq!(document.sheet_names(), vec!["Notes".to_owned()]);
    }

    #[test]
    fn rejects_wrong_mime_type() {
        let bytes = workbook_bytes(&[("mimetype", "application/zip"), ("content.xml", CONTENT)]);
        assert!(OdsSpreadsheet::open("bad.ods", UnifiedReader::from_bytes(bytes), &Criteria::default()).is_err());
    }
}
