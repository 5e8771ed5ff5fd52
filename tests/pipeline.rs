use rusty_survey::config::HeaderLayout;
use rusty_survey::table::column::ColumnType;
use rusty_survey::table::column::Value;
use rusty_survey::Pipeline;
use rusty_survey::PipelineConfig;
use rusty_survey::PipelineError;
use rusty_survey::RawGrid;
use std::io::Cursor;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// One worksheet row as (column letter, cell) pairs; numbers are written as numeric cells.
/// A full reference such as "C1048576" places the cell (and its row) explicitly.
type Row = &'static [(&'static str, &'static str)];

fn sheet_xml(rows: &[Row]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (index, row) in rows.iter().enumerate() {
        let explicit = row
            .first()
            .and_then(|(col, _)| col.trim_start_matches(|c: char| c.is_ascii_alphabetic()).parse::<usize>().ok());
        let number = explicit.unwrap_or(index + 1);
        xml.push_str(&format!(r#"<row r="{number}">"#));
        for (col, value) in row.iter() {
            let reference = if col.ends_with(|c: char| c.is_ascii_digit()) {
                col.to_string()
            } else {
                format!("{col}{number}")
            };
            if value.parse::<f64>().is_ok() {
                xml.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#));
            } else {
                xml.push_str(&format!(r#"<c r="{reference}" t="inlineStr"><is><t>{value}</t></is></c>"#));
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn workbook(sheets: &[(&str, &[Row])]) -> Vec<u8> {
    let mut relationships = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    let mut book = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (index, (name, rows)) in sheets.iter().enumerate() {
        let id = index + 1;
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{id}.xml"/>"#
        ));
        book.push_str(&format!(r#"<sheet name="{name}" sheetId="{id}" r:id="rId{id}"/>"#));
        writer
            .start_file(format!("xl/worksheets/sheet{id}.xml"), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(sheet_xml(rows).as_bytes()).unwrap();
    }
    relationships.push_str("</Relationships>");
    book.push_str("</sheets></workbook>");
    writer
        .start_file("xl/_rels/workbook.xml.rels", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(relationships.as_bytes()).unwrap();
    writer.start_file("xl/workbook.xml", SimpleFileOptions::default()).unwrap();
    writer.write_all(book.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

fn two_header_rows() -> PipelineConfig {
    PipelineConfig {
        layouts: vec![HeaderLayout::sentinel(vec![0, 1], "Respondent")],
        ..PipelineConfig::default()
    }
}

const WAVE_1: &[Row] = &[
    &[("B", "Age"), ("C", "Company")],
    &[("B", "Years"), ("C", "Name")],
    &[("A", "Respondent 1"), ("B", "25"), ("C", "A")],
    &[("B", "31"), ("C", "B")],
    &[("B", "40"), ("C", "A")],
];

const WAVE_2: &[Row] = &[
    &[("B", "Age"), ("C", "Vehicle")],
    &[("B", "Years")],
    &[("A", "Respondent 1"), ("B", "28"), ("C", "Bike")],
    &[("B", "35"), ("C", "Car")],
    &[("B", "44"), ("C", "Van")],
    &[("B", "52"), ("C", "Car")],
];

fn numbers(values: &[f64]) -> Vec<Value> {
    values.iter().copied().map(Value::Number).collect()
}

#[test]
fn well_formed_sheet_normalizes_headers_and_types() {
    let pipeline = Pipeline::new(two_header_rows()).unwrap();
    let output = pipeline
        .load_bytes("survey.xlsx", workbook(&[("Wave 1", WAVE_1)]), None)
        .unwrap();

    let table = &output.table;
    assert_eq!(table.names(), vec!["Age (Years)", "Company"]);
    assert_eq!(table.row_count(), 3);
    let age = table.column("Age (Years)").unwrap();
    assert_eq!(age.kind, ColumnType::Numeric);
    assert_eq!(age.values, numbers(&[25.0, 31.0, 40.0]));
    assert_eq!(table.column("Company").unwrap().kind, ColumnType::Categorical);
    assert_eq!(output.diagnostics.dropped_names(), vec!["Respondent"]);
}

#[test]
fn grid_without_data_start_reports_header_not_found() {
    let grid = RawGrid::from_strings(vec![
        vec!["", "Age", "Company"],
        vec!["", "Years", "Name"],
        vec!["1", "25", "A"],
        vec!["2", "31", "B"],
    ]);
    let pipeline = Pipeline::new(two_header_rows()).unwrap();

    let result = pipeline.process_grid("Wave 1", &grid);
    assert!(matches!(result, Err(PipelineError::HeaderNotFound(_))));

    let result = pipeline.process_sheets(vec![("Wave 1".to_owned(), grid)], None);
    assert!(matches!(result, Err(PipelineError::EmptyDataset(reason)) if reason.contains("Header not found")));
}

#[test]
fn sheets_concatenate_with_outer_join_on_columns() {
    let pipeline = Pipeline::new(two_header_rows()).unwrap();
    let output = pipeline
        .load_bytes("survey.xlsx", workbook(&[("Wave 1", WAVE_1), ("Wave 2", WAVE_2)]), None)
        .unwrap();

    let table = &output.table;
    assert_eq!(output.sheets, vec![("Wave 1".to_owned(), 3), ("Wave 2".to_owned(), 4)]);
    assert_eq!(table.row_count(), 7);
    assert_eq!(table.names(), vec!["Age (Years)", "Company", "Vehicle"]);
    assert_eq!(
        table.column("Age (Years)").unwrap().values,
        numbers(&[25.0, 31.0, 40.0, 28.0, 35.0, 44.0, 52.0])
    );
    assert_eq!(table.value(4, "Company"), Some(&Value::Missing));
    assert_eq!(table.value(0, "Vehicle"), Some(&Value::Missing));
    assert_eq!(table.value(6, "Vehicle"), Some(&Value::Text("Car".to_owned())));
}

#[test]
fn sheet_patterns_select_sheets() {
    let config = PipelineConfig {
        sheets: Some(vec!["*2".to_owned()]),
        ..two_header_rows()
    };
    let output = Pipeline::new(config)
        .unwrap()
        .load_bytes("survey.xlsx", workbook(&[("Wave 1", WAVE_1), ("Wave 2", WAVE_2)]), None)
        .unwrap();
    assert_eq!(output.sheets, vec![("Wave 2".to_owned(), 4)]);
}

const WAVE_1_WITH_STRAY_CELL: &[Row] = &[
    &[("B", "Age"), ("C", "Company")],
    &[("B", "Years"), ("C", "Name")],
    &[("A", "Respondent 1"), ("B", "25"), ("C", "A")],
    &[("B", "31"), ("C", "B")],
    &[("B", "40"), ("C", "A")],
    &[("C1048576", "stray")],
];

#[test]
fn cells_past_the_column_limit_are_ignored() {
    const FAR_RIGHT: &[Row] = &[
        &[("B", "Age"), ("C", "Company"), ("XFD1", "stray")],
        &[("B", "Years"), ("C", "Name")],
        &[("A", "Respondent 1"), ("B", "25"), ("C", "A")],
        &[("B", "31"), ("C", "B")],
        &[("B", "40"), ("C", "A")],
    ];
    let output = Pipeline::new(two_header_rows())
        .unwrap()
        .load_bytes("survey.xlsx", workbook(&[("Wave 1", FAR_RIGHT)]), None)
        .unwrap();
    assert_eq!(output.table.names(), vec!["Age (Years)", "Company"]);
}

#[test]
fn oversized_sheet_is_skipped_not_allocated() {
    let pipeline = Pipeline::new(two_header_rows()).unwrap();
    let result = pipeline.load_bytes("survey.xlsx", workbook(&[("Wave 1", WAVE_1_WITH_STRAY_CELL)]), None);
    assert!(matches!(result, Err(PipelineError::EmptyDataset(reason)) if reason.contains("max_rows")));

    let bounded = PipelineConfig {
        max_rows: Some(100),
        ..two_header_rows()
    };
    let output = Pipeline::new(bounded)
        .unwrap()
        .load_bytes("survey.xlsx", workbook(&[("Wave 1", WAVE_1_WITH_STRAY_CELL)]), None)
        .unwrap();
    assert_eq!(output.table.row_count(), 3);
}

#[test]
fn delimited_file_from_path() {
    let path = std::env::temp_dir().join(format!("rusty_survey_{}_wave.csv", std::process::id()));
    std::fs::write(
        &path,
        b";Age;How long with your current employer\n;Years;\n;;\nRespondent 1;25;14 months\n;31;5 Years\n;nan;2\n;40;about 3 years\n",
    )
    .unwrap();
    let output = Pipeline::new(PipelineConfig::default()).unwrap().load_path(&path, None);
    std::fs::remove_file(&path).unwrap();
    let output = output.unwrap();

    let table = &output.table;
    assert_eq!(table.names(), vec!["Age (Years)", "How long with your current employer"]);
    assert_eq!(
        table.column("Age (Years)").unwrap().values,
        vec![Value::Number(25.0), Value::Number(31.0), Value::Missing, Value::Number(40.0)]
    );
    assert_eq!(
        table.column("How long with your current employer").unwrap().values,
        numbers(&[14.0, 5.0, 2.0, 3.0])
    );
}

#[test]
fn clean_table_round_trips_through_filter_and_export() {
    let pipeline = Pipeline::new(two_header_rows()).unwrap();
    let output = pipeline
        .load_bytes("survey.xlsx", workbook(&[("Wave 1", WAVE_1)]), None)
        .unwrap();
    let subset = rusty_survey::filter::TableFilter::new()
        .select("Company", ["A"])
        .apply(&output.table);
    let csv = rusty_survey::export::to_csv_bytes(&subset).unwrap();

    assert_eq!(String::from_utf8(csv).unwrap(), "Age (Years),Company\n25,A\n40,A\n");
    assert_eq!(output.table.row_count(), 3);
}
