//! Delimited text (CSV, TSV, semicolon exports) as a single-sheet source.

use crate::error::RustySurveyError;
use crate::helpers::reader::UnifiedReader;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use crate::table::grid::widen;
use crate::table::grid::RawGrid;
use encoding_rs::Encoding;
use encoding_rs::WINDOWS_1252;
use std::path::Path;

/// Delimiters tried when sniffing, in order of preference on ties.
const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// A delimited file, parsed eagerly into one grid.
pub(crate) struct DelimitedSpreadsheet {
    name: String,
    sheet_name: String,
    grid: RawGrid,
}

impl DelimitedSpreadsheet {
    pub(crate) fn open(name: &str, reader: UnifiedReader, criteria: &Criteria) -> Result<Self, RustySurveyError> {
        let text = decode(reader.into_bytes()?, criteria.codepage);
        let delimiter = sniff_delimiter(&text);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(text.as_bytes());
        let mut rows = Vec::new();
        for record in reader.records() {
            if criteria.rows_limit.map(|limit| rows.len() >= limit).unwrap_or(false) {
                break;
            }
            let record = record?;
            rows.push(record.iter().map(widen).collect());
        }
        let sheet_name = Path::new(name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| "Sheet1".to_owned());
        Ok(DelimitedSpreadsheet {
            name: name.to_owned(),
            sheet_name,
            grid: RawGrid::new(rows),
        })
    }
}

impl Spreadsheet for DelimitedSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        vec![self.sheet_name.to_owned()]
    }

    fn read_grid(&mut self, sheet_name: &str) -> Result<RawGrid, RustySurveyError> {
        if sheet_name == self.sheet_name {
            Ok(self.grid.clone())
        } else {
            Err(SpreadsheetError::SheetNotFound(sheet_name.to_owned()).into())
        }
    }
}

/// Decodes text honoring a byte-order mark, then UTF-8, then the configured code page.
fn decode(bytes: Vec<u8>, codepage: u16) -> String {
    if let Some((encoding, bom_length)) = Encoding::for_bom(&bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_length..]);
        return text.into_owned();
    }
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(error) => {
            let encoding = codepage::to_encoding(codepage).unwrap_or(WINDOWS_1252);
            let (text, _, _) = encoding.decode(error.as_bytes());
            text.into_owned()
        }
    }
}

/// Picks the candidate occurring most often (outside quotes) on the first non-empty line.
fn sniff_delimiter(text: &str) -> u8 {
    let line = text.lines().find(|line| !line.trim().is_empty()).unwrap_or_default();
    let mut counts = [0usize; DELIMITERS.len()];
    let mut quoted = false;
    for byte in line.bytes() {
        if byte == b'"' {
            quoted = !quoted;
        } else if !quoted {
            if let Some(index) = DELIMITERS.iter().position(|delimiter| *delimiter == byte) {
                counts[index] += 1;
            }
        }
    }
    counts
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .max_by(|(left_index, left), (right_index, right)| left.cmp(right).then(right_index.cmp(left_index)))
        .map(|(index, _)| DELIMITERS[index])
        .unwrap_or(b',')
}
