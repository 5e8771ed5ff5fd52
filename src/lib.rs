//! # Rusty Survey
//!
//! Header inference and schema normalization for messy, multi-row survey spreadsheets.
//! A raw grid of cells with no trustworthy header row goes in; a clean table of uniquely
//! named, typed columns comes out, together with diagnostics describing what was dropped
//! or guessed along the way.
//!
//! ## Features
//!
//! - **Multi-format loading**: Excel (`.xlsx`, `.xlsm`, `.xlam`), OpenDocument (`.ods`) and
//!   delimited text (`.csv`, `.tsv`), from a path or an in-memory upload
//! - **Header synthesis**: main and sub-header rows merged into one name per column, with
//!   keyword-driven canonical names, unit suffixes and long-label shortening
//! - **Data-start detection**: a sentinel token search with fixed-offset fallbacks
//! - **Type coercion**: majority-threshold numeric detection, a duration cleaner for free
//!   text like "14 months", and categorical/text tagging by cardinality
//! - **Column pruning**: empty, sparse and degenerate columns are dropped and reported
//! - **Multi-sheet concatenation**: outer join on column names
//! - **Collaborators**: filtering, grouped aggregates and crosstabs, CSV export and an LRU
//!   result cache keyed by content hash
//!
//! ## Example
//!
//! ```no_run
//! use rusty_survey::config::PipelineConfig;
//! use rusty_survey::pipeline::Pipeline;
//! use std::path::Path;
//!
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//! let output = pipeline.load_path(Path::new("survey.xlsx"), None)?;
//! output.diagnostics.emit();
//! println!("{} rows, columns {:?}", output.table.row_count(), output.table.names());
//! # Ok::<(), rusty_survey::pipeline::PipelineError>(())
//! ```

mod helpers;

pub mod analysis;
pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod pipeline;
pub mod spreadsheet;
pub mod table;

pub use crate::config::PipelineConfig;
pub use crate::error::RustySurveyError;
pub use crate::pipeline::Diagnostics;
pub use crate::pipeline::Pipeline;
pub use crate::pipeline::PipelineError;
pub use crate::pipeline::PipelineOutput;
pub use crate::table::clean::CleanTable;
pub use crate::table::grid::RawGrid;
