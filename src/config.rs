//! Pipeline configuration.
//!
//! Every heuristic the pipeline applies (header-row layouts, the data-start sentinel,
//! positional field rules, unit phrasing, keyword classes, coercion and pruning thresholds)
//! lives here as data. Partial JSON documents override only the fields they name:
//!
//! ```
//! use rusty_survey::config::PipelineConfig;
//!
//! let config = PipelineConfig::from_json_str(r#"{ "numeric_threshold": 0.7 }"#).unwrap();
//! assert_eq!(config.numeric_threshold, 0.7);
//! assert_eq!(config.max_name_length, 50);
//! ```

use crate::error::RustySurveyError;
use crate::error::ResultMessage;
use glob::Pattern;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Configuration values that cannot drive the pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("At least one header layout is required")]
    NoLayouts,

    #[error("Header layout #{0} names no header rows")]
    EmptyHeaderRows(usize),

    #[error("Header layout #{0} starts data at row {1}, inside its header rows")]
    DataStartOverlapsHeader(usize, usize),

    #[error("Numeric threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),

    #[error("Invalid pattern '{0}': {1}")]
    InvalidPattern(String, String),
}

/// Where the data region of a sheet begins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataStart {
    /// First row after the header rows with a cell containing `token` (case-insensitive),
    /// searched within absolute rows `< max_rows` and columns `< max_cols`.
    Sentinel {
        token: String,
        max_rows: usize,
        max_cols: usize,
        /// Absolute row used, with a warning, when the token is absent
        #[serde(default)]
        fallback_offset: Option<usize>,
    },
    /// Data starts at this absolute row.
    FixedOffset { row: usize },
}

/// One header interpretation strategy: which rows carry labels and where data begins.
/// `header_rows[0]` is the main header, `header_rows[1]` (if any) the sub-header.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeaderLayout {
    pub header_rows: Vec<usize>,
    pub data_start: DataStart,
}

impl HeaderLayout {
    pub fn sentinel(header_rows: Vec<usize>, token: &str) -> Self {
        HeaderLayout {
            header_rows,
            data_start: DataStart::Sentinel {
                token: token.to_owned(),
                max_rows: 10,
                max_cols: 5,
                fallback_offset: None,
            },
        }
    }

    pub fn fixed(header_rows: Vec<usize>, row: usize) -> Self {
        HeaderLayout {
            header_rows,
            data_start: DataStart::FixedOffset { row },
        }
    }

    pub(crate) fn last_header_row(&self) -> Option<usize> {
        self.header_rows.iter().copied().max()
    }
}

/// Maps a main-header keyword to a canonical field name, expected at `position`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub position: usize,
    pub keyword: String,
    pub name: String,
}

/// Sub-header phrasing that maps to a fixed unit suffix, e.g. "days per month" → "(Days)".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitSuffix {
    pub marker: String,
    pub suffix: String,
}

/// A long label containing every keyword collapses to `label`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelRewrite {
    pub keywords: Vec<String>,
    pub label: String,
}

/// Classes a column name can fall into by keyword.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldClass {
    /// Free-text durations ("14 months") reduced to their first number
    Duration,
    /// Optional free-text follow-ups, pruned when nearly empty
    KnownSparse,
    /// Names suggesting a numeric measure
    NumericHint,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeywordClass {
    pub keyword: String,
    pub class: FieldClass,
}

/// Every tunable of the normalization pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Header layouts tried in order; the first is primary, the rest are fallbacks
    pub layouts: Vec<HeaderLayout>,
    /// Placeholder name for a header-less first column
    pub first_column_name: String,
    /// Sub-headers at least this long (in characters) are not appended
    pub sub_header_max_len: usize,
    pub max_name_length: usize,
    /// Positional field rules only consider columns with an index below this
    pub positional_window: usize,
    pub field_rules: Vec<FieldRule>,
    pub unit_suffixes: Vec<UnitSuffix>,
    pub label_rewrites: Vec<LabelRewrite>,
    /// Text values treated as missing (case-insensitive, after trimming)
    pub null_literals: Vec<String>,
    pub numeric_threshold: f64,
    /// Non-numeric columns with fewer distinct values than this are categorical
    pub categorical_max_unique: usize,
    pub duration_token_pattern: String,
    pub keyword_classes: Vec<KeywordClass>,
    /// Restrict generic numeric coercion to names carrying a numeric hint
    pub coerce_hinted_only: bool,
    pub min_sparse_responses: usize,
    pub min_degenerate_responses: usize,
    pub degenerate_max_unique: usize,
    /// Replaces synthesized names (padded or truncated to the sheet width)
    pub explicit_names: Option<Vec<String>>,
    /// Glob patterns selecting sheets by name
    pub sheets: Option<Vec<String>>,
    pub sheet_limit: Option<usize>,
    /// Upper bound on rows read per sheet
    pub max_rows: Option<usize>,
    /// Cells at or past this column are ignored
    pub max_cols: usize,
    /// Largest rows-by-columns grid a sheet may produce before it is skipped
    pub max_cells: usize,
    /// Windows code page for delimited text that is not UTF-8
    pub csv_codepage: u16,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let rule = |position: usize, keyword: &str, name: &str| FieldRule {
            position,
            keyword: keyword.to_owned(),
            name: name.to_owned(),
        };
        let class = |keyword: &str, class: FieldClass| KeywordClass {
            keyword: keyword.to_owned(),
            class,
        };
        PipelineConfig {
            layouts: vec![
                HeaderLayout::sentinel(vec![0, 2], "Respondent"),
                HeaderLayout::fixed(vec![0, 2], 3),
                HeaderLayout::fixed(vec![0], 1),
            ],
            first_column_name: "Respondent".to_owned(),
            sub_header_max_len: 30,
            max_name_length: 50,
            positional_window: 6,
            field_rules: vec![
                rule(1, "age", "Age (Years)"),
                rule(2, "area", "Areas Covered"),
                rule(3, "company", "Company"),
                rule(4, "employment", "Employment Status"),
            ],
            unit_suffixes: vec![
                UnitSuffix {
                    marker: "days per month".to_owned(),
                    suffix: "Days".to_owned(),
                },
                UnitSuffix {
                    marker: "egp".to_owned(),
                    suffix: "EGP".to_owned(),
                },
            ],
            label_rewrites: vec![LabelRewrite {
                keywords: vec!["benefit".to_owned(), "direct employee".to_owned()],
                label: "Benefits (Direct Employee)".to_owned(),
            }],
            null_literals: vec!["nan".to_owned(), "none".to_owned(), "null".to_owned()],
            numeric_threshold: 0.5,
            categorical_max_unique: 50,
            duration_token_pattern: r"\d+(?:\.\d+)?".to_owned(),
            keyword_classes: vec![
                class("how long", FieldClass::Duration),
                class("working with your current", FieldClass::Duration),
                class("current employer", FieldClass::Duration),
                class("current company", FieldClass::Duration),
                class("please specify", FieldClass::KnownSparse),
                class("if other", FieldClass::KnownSparse),
                class("comment", FieldClass::KnownSparse),
                class("empty_col_", FieldClass::KnownSparse),
                class("extra_col_", FieldClass::KnownSparse),
                class("age", FieldClass::NumericHint),
                class("year", FieldClass::NumericHint),
                class("egp", FieldClass::NumericHint),
                class("days", FieldClass::NumericHint),
                class("hours", FieldClass::NumericHint),
                class("deliveries", FieldClass::NumericHint),
                class("income", FieldClass::NumericHint),
                class("salary", FieldClass::NumericHint),
                class("allowance", FieldClass::NumericHint),
            ],
            coerce_hinted_only: false,
            min_sparse_responses: 5,
            min_degenerate_responses: 3,
            degenerate_max_unique: 2,
            explicit_names: None,
            sheets: None,
            sheet_limit: None,
            max_rows: None,
            max_cols: 1024,
            max_cells: 2_000_000,
            csv_codepage: 1252,
        }
    }
}

impl PipelineConfig {
    /// Parses a (possibly partial) JSON document and validates it.
    pub fn from_json_str(json: &str) -> Result<Self, RustySurveyError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, RustySurveyError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json).with_prefix(&path.display().to_string())
    }

    /// Canonical serialized form, used as part of cache keys.
    pub fn to_json(&self) -> Result<String, RustySurveyError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Checks the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layouts.is_empty() {
            return Err(ConfigError::NoLayouts);
        }
        for (index, layout) in self.layouts.iter().enumerate() {
            let last_header_row = layout
                .last_header_row()
                .ok_or(ConfigError::EmptyHeaderRows(index))?;
            if let DataStart::FixedOffset { row } = layout.data_start {
                if row <= last_header_row {
                    return Err(ConfigError::DataStartOverlapsHeader(index, row));
                }
            }
        }
        if !(0.0..=1.0).contains(&self.numeric_threshold) {
            return Err(ConfigError::InvalidThreshold(self.numeric_threshold));
        }
        self.duration_regex()?;
        self.sheet_patterns()?;
        Ok(())
    }

    pub(crate) fn duration_regex(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.duration_token_pattern)
            .map_err(|e| ConfigError::InvalidPattern(self.duration_token_pattern.clone(), e.to_string()))
    }

    pub(crate) fn sheet_patterns(&self) -> Result<Option<Vec<Pattern>>, ConfigError> {
        self.sheets
            .as_ref()
            .map(|patterns| {
                patterns
                    .iter()
                    .map(|pattern| {
                        Pattern::new(pattern).map_err(|e| ConfigError::InvalidPattern(pattern.clone(), e.to_string()))
                    })
                    .collect()
            })
            .transpose()
    }

    pub fn classifier(&self) -> FieldClassifier {
        FieldClassifier::new(&self.keyword_classes)
    }
}

/// Keyword-driven classification of column names, built from [`PipelineConfig::keyword_classes`].
#[derive(Clone, Debug, Default)]
pub struct FieldClassifier {
    keywords: Vec<(String, FieldClass)>,
}

impl FieldClassifier {
    pub fn new(classes: &[KeywordClass]) -> Self {
        FieldClassifier {
            keywords: classes
                .iter()
                .filter(|entry| !entry.keyword.is_empty())
                .map(|entry| (entry.keyword.to_lowercase(), entry.class))
                .collect(),
        }
    }

    /// True when the name contains any keyword of the class, case-insensitively.
    pub fn is(&self, name: &str, class: FieldClass) -> bool {
        let name = name.to_lowercase();
        self.keywords
            .iter()
            .any(|(keyword, kind)| *kind == class && name.contains(keyword.as_str()))
    }
}
