use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use log::info;
use rusty_survey::config::PipelineConfig;
use rusty_survey::export::write_csv;
use rusty_survey::filter::TableFilter;
use rusty_survey::pipeline::Pipeline;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::PathBuf;

/// Normalize a messy survey spreadsheet into a clean CSV table.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Spreadsheet or delimited text file (.xlsx, .xlsm, .ods, .csv, .tsv).
    input: PathBuf,

    /// JSON pipeline configuration; omitted fields keep their defaults.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the clean table here instead of stdout.
    #[arg(long, short, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Only process sheets whose names match these glob patterns (repeatable).
    #[arg(long = "sheet", value_name = "GLOB")]
    sheets: Vec<String>,

    /// Keep only rows where a column holds one of the given values (`COLUMN=VALUE`, repeatable).
    #[arg(long = "where", value_name = "COLUMN=VALUE")]
    selections: Vec<String>,

    /// Print the filter surface as JSON instead of the table.
    #[arg(long)]
    surface: bool,

    /// Print diagnostics as JSON to stderr.
    #[arg(long)]
    diagnostics: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_path(path).context("loading pipeline configuration")?,
        None => PipelineConfig::default(),
    };
    if !args.sheets.is_empty() {
        config.sheets = Some(args.sheets.clone());
    }
    let pipeline = Pipeline::new(config).context("invalid pipeline configuration")?;
    let output = pipeline
        .load_path(&args.input, None)
        .with_context(|| format!("processing {}", args.input.display()))?;
    output.diagnostics.emit();
    for (sheet, rows) in &output.sheets {
        info!("Sheet '{sheet}': {rows} rows");
    }
    if args.diagnostics {
        eprintln!("{}", serde_json::to_string_pretty(&output.diagnostics)?);
    }

    let table = parse_filter(&args.selections)?.apply(&output.table);
    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };
    if args.surface {
        serde_json::to_writer_pretty(&mut writer, &table.filter_surface())?;
        writeln!(writer)?;
    } else {
        write_csv(&table, &mut writer).context("writing CSV")?;
    }
    writer.flush()?;
    Ok(())
}

fn parse_filter(selections: &[String]) -> Result<TableFilter> {
    let mut grouped = std::collections::BTreeMap::<String, Vec<String>>::new();
    for selection in selections {
        let (column, value) = selection
            .split_once('=')
            .with_context(|| format!("expected COLUMN=VALUE, got '{selection}'"))?;
        grouped
            .entry(column.trim().to_owned())
            .or_default()
            .push(value.trim().to_owned());
    }
    Ok(grouped
        .into_iter()
        .fold(TableFilter::new(), |filter, (column, values)| filter.select(&column, values)))
}
