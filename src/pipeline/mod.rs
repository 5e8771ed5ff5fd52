//! # Normalization pipeline
//!
//! Raw grid → synthesized headers → unique names → data region → typed columns → pruned
//! columns, once per sheet. Sheets of one source are processed in order and their clean
//! tables are concatenated with outer-join-on-columns semantics.
//!
//! The pipeline is a pure function of its input and [`PipelineConfig`]: it keeps no state
//! between calls and reports everything worth telling a human through [`Diagnostics`]
//! instead of logging.

pub mod coercion;
pub mod dedup;
pub mod header;
pub mod region;
pub mod sanitize;

use crate::config::ConfigError;
use crate::config::HeaderLayout;
use crate::config::PipelineConfig;
use crate::pipeline::coercion::CoercionEngine;
use crate::pipeline::dedup::deduplicate;
use crate::pipeline::header::fit_to_width;
use crate::pipeline::header::HeaderSynthesizer;
use crate::pipeline::region::extract_region;
use crate::pipeline::sanitize::ColumnSanitizer;
use crate::pipeline::sanitize::DroppedColumn;
use crate::spreadsheet;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::Spreadsheet;
use crate::table::clean::CleanTable;
use crate::table::grid::RawGrid;
use log::info;
use log::warn;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use thiserror::Error;

/// Failures of a whole sheet or a whole source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Source unreadable: {0}")]
    SourceUnreadable(String),

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Header not found: {0}")]
    HeaderNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Cancelled before sheet '{0}'")]
    Cancelled(String),
}

/// A sheet that contributed no rows, and why.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkippedSheet {
    pub sheet: String,
    pub reason: String,
}

/// Everything the pipeline wants a human to know about one run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub dropped_columns: Vec<DroppedColumn>,
    pub skipped_sheets: Vec<SkippedSheet>,
    pub warnings: Vec<String>,
}

impl Diagnostics {
    /// Names of the dropped columns in drop order.
    pub fn dropped_names(&self) -> Vec<&str> {
        self.dropped_columns.iter().map(|dropped| dropped.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.dropped_columns.is_empty() && self.skipped_sheets.is_empty() && self.warnings.is_empty()
    }

    /// Forwards every diagnostic to the `log` facade.
    pub fn emit(&self) {
        for skipped in &self.skipped_sheets {
            warn!("Skipped sheet '{}': {}", skipped.sheet, skipped.reason);
        }
        for warning in &self.warnings {
            warn!("{warning}");
        }
        for dropped in &self.dropped_columns {
            info!("Dropped column '{}' of sheet '{}': {}", dropped.name, dropped.sheet, dropped.reason);
        }
    }

    fn extend(&mut self, other: Diagnostics) {
        self.dropped_columns.extend(other.dropped_columns);
        self.skipped_sheets.extend(other.skipped_sheets);
        self.warnings.extend(other.warnings);
    }
}

/// Result of one sheet.
#[derive(Clone, Debug, PartialEq)]
pub struct SheetOutput {
    pub sheet: String,
    pub table: CleanTable,
    /// Index into [`PipelineConfig::layouts`] of the layout that produced the table
    pub layout: usize,
    pub diagnostics: Diagnostics,
}

/// Result of a whole source.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineOutput {
    pub table: CleanTable,
    /// Contributing sheets with their retained row counts, in processing order
    pub sheets: Vec<(String, usize)>,
    pub diagnostics: Diagnostics,
}

/// The configured pipeline.
#[derive(Clone, Debug)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        HeaderSynthesizer::new(&config)?;
        Ok(Pipeline { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs one grid through the pipeline, trying each configured layout in order.
    ///
    /// A layout that cannot locate its data or yields nothing usable falls through to the
    /// next one; when every layout fails, the error of the last one is returned.
    pub fn process_grid(&self, sheet: &str, grid: &RawGrid) -> Result<SheetOutput, PipelineError> {
        if grid.is_empty() {
            return Err(PipelineError::EmptyDataset(format!("sheet '{sheet}' is empty")));
        }
        let synthesizer = HeaderSynthesizer::new(&self.config)?;
        let engine = CoercionEngine::new(&self.config)?;
        let sanitizer = ColumnSanitizer::new(&self.config);

        let mut last_error = None;
        for (index, layout) in self.config.layouts.iter().enumerate() {
            match self.apply_layout(sheet, grid, layout, &synthesizer, &engine, &sanitizer) {
                Ok((table, mut diagnostics)) => {
                    if index > 0 {
                        diagnostics
                            .warnings
                            .insert(0, format!("{sheet}: primary header layout failed, used fallback layout {index}"));
                    }
                    return Ok(SheetOutput {
                        sheet: sheet.to_owned(),
                        table,
                        layout: index,
                        diagnostics,
                    });
                }
                Err(e @ (PipelineError::HeaderNotFound(_) | PipelineError::EmptyDataset(_))) => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| PipelineError::EmptyDataset(format!("sheet '{sheet}' has no layouts"))))
    }

    fn apply_layout(
        &self,
        sheet: &str,
        grid: &RawGrid,
        layout: &HeaderLayout,
        synthesizer: &HeaderSynthesizer,
        engine: &CoercionEngine,
        sanitizer: &ColumnSanitizer,
    ) -> Result<(CleanTable, Diagnostics), PipelineError> {
        let mut diagnostics = Diagnostics::default();
        let candidates = match &self.config.explicit_names {
            Some(names) => fit_to_width(names.to_owned(), grid.width()),
            None => {
                let headers = synthesizer.synthesize(grid, layout);
                diagnostics.warnings.extend(headers.warnings);
                headers.names
            }
        };
        let names = deduplicate(&candidates);
        let region = extract_region(grid, layout, &names, &self.config.null_literals)?;
        diagnostics.warnings.extend(region.warnings);

        let report = engine.coerce(region.columns, region.rows);
        diagnostics.warnings.extend(report.outcomes.iter().map(ToString::to_string));
        let (columns, dropped) = sanitizer.sanitize(sheet, report.columns);
        diagnostics.dropped_columns = dropped;
        if columns.is_empty() {
            return Err(PipelineError::EmptyDataset(format!("every column of sheet '{sheet}' was pruned")));
        }
        for warning in &mut diagnostics.warnings {
            *warning = format!("{sheet}: {warning}");
        }
        Ok((CleanTable::new(columns), diagnostics))
    }

    /// Processes already loaded sheets in order and concatenates their tables.
    ///
    /// Sheets that fail are recorded as skipped; the run fails with `EmptyDataset` only when
    /// no sheet produced a table. `cancel` is checked before each sheet.
    pub fn process_sheets<I>(&self, sheets: I, cancel: Option<&AtomicBool>) -> Result<PipelineOutput, PipelineError>
    where
        I: IntoIterator<Item = (String, RawGrid)>,
    {
        let (names, grids): (Vec<String>, Vec<RawGrid>) = sheets.into_iter().unzip();
        let mut grids = grids.into_iter();
        self.run(names, |_| grids.next().ok_or_else(|| "sheet without grid".to_owned()), cancel)
    }

    /// Loads a file and processes its selected sheets.
    pub fn load_path(&self, path: &Path, cancel: Option<&AtomicBool>) -> Result<PipelineOutput, PipelineError> {
        let criteria = Criteria::from_config(&self.config)?;
        let spreadsheet = spreadsheet::open_path(path, &criteria)
            .map_err(|e| PipelineError::SourceUnreadable(format!("{}: {e}", path.display())))?;
        self.load(spreadsheet, &criteria, cancel)
    }

    /// Loads an in-memory upload; `name` labels diagnostics and delimited sheets.
    pub fn load_bytes(&self, name: &str, bytes: Vec<u8>, cancel: Option<&AtomicBool>) -> Result<PipelineOutput, PipelineError> {
        let criteria = Criteria::from_config(&self.config)?;
        let spreadsheet = spreadsheet::open_bytes(name, bytes, &criteria)
            .map_err(|e| PipelineError::SourceUnreadable(format!("{name}: {e}")))?;
        self.load(spreadsheet, &criteria, cancel)
    }

    fn load(
        &self,
        mut spreadsheet: Box<dyn Spreadsheet>,
        criteria: &Criteria,
        cancel: Option<&AtomicBool>,
    ) -> Result<PipelineOutput, PipelineError> {
        let selected = criteria.select(&spreadsheet.sheet_names());
        if selected.is_empty() {
            return Err(PipelineError::EmptyDataset(format!("no sheet of {} was selected", spreadsheet.name())));
        }
        self.run(selected, |name| spreadsheet.read_grid(name).map_err(|e| e.to_string()), cancel)
    }

    /// Reads and processes `names` one at a time, so a cancelled run never reads the next sheet.
    fn run<F>(&self, names: Vec<String>, mut read: F, cancel: Option<&AtomicBool>) -> Result<PipelineOutput, PipelineError>
    where
        F: FnMut(&str) -> Result<RawGrid, String>,
    {
        let mut diagnostics = Diagnostics::default();
        let mut tables = Vec::new();
        let mut contributing = Vec::new();
        for name in names {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(PipelineError::Cancelled(name));
            }
            let outcome = read(&name)
                .map_err(PipelineError::SourceUnreadable)
                .and_then(|grid| self.process_grid(&name, &grid));
            match outcome {
                Ok(output) => {
                    contributing.push((name, output.table.row_count()));
                    diagnostics.extend(output.diagnostics);
                    tables.push(output.table);
                }
                Err(e @ PipelineError::InvalidConfig(_)) => return Err(e),
                Err(e) => diagnostics.skipped_sheets.push(SkippedSheet {
                    sheet: name,
                    reason: e.to_string(),
                }),
            }
        }
        if tables.is_empty() {
            let reasons: Vec<String> = diagnostics
                .skipped_sheets
                .iter()
                .map(|skipped| format!("{}: {}", skipped.sheet, skipped.reason))
                .collect();
            return Err(PipelineError::EmptyDataset(if reasons.is_empty() {
                "no sheets".to_owned()
            } else {
                format!("no usable sheet ({})", reasons.join("; "))
            }));
        }
        Ok(PipelineOutput {
            table: CleanTable::concat(tables, self.config.categorical_max_unique),
            sheets: contributing,
            diagnostics,
        })
    }
}
