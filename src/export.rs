//! CSV serialization of a clean table, keeping its column order and row order.

use crate::error::RustySurveyError;
use crate::table::clean::CleanTable;
use std::io::Write;

/// Writes a header record of column names followed by one record per row. Missing values
/// are written as empty fields and numbers in their shortest display form.
pub fn write_csv<W: Write>(table: &CleanTable, writer: W) -> Result<(), RustySurveyError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(table.names())?;
    for row in 0..table.row_count() {
        writer.write_record(table.columns().iter().map(|column| column.values[row].to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_csv_bytes(table: &CleanTable) -> Result<Vec<u8>, RustySurveyError> {
    let mut bytes = Vec::new();
    write_csv(table, &mut bytes)?;
    Ok(bytes)
}
