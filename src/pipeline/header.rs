//! Header Synthesizer: one semantic column name per grid column, built from a main and an
//! optional sub-header row.

use crate::config::ConfigError;
use crate::config::FieldClass;
use crate::config::FieldClassifier;
use crate::config::FieldRule;
use crate::config::HeaderLayout;
use crate::config::PipelineConfig;
use crate::pipeline::PipelineError;
use crate::table::grid::RawGrid;
use regex::Regex;
use std::collections::HashSet;

/// Names synthesized for one sheet, plus warnings worth a human look.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SynthesizedHeaders {
    pub names: Vec<String>,
    pub warnings: Vec<String>,
}

struct CompiledRule<'a> {
    rule: &'a FieldRule,
    matcher: Regex,
}

/// Compiled header rules of a [`PipelineConfig`].
pub struct HeaderSynthesizer<'a> {
    config: &'a PipelineConfig,
    rules: Vec<CompiledRule<'a>>,
    classifier: FieldClassifier,
}

impl<'a> HeaderSynthesizer<'a> {
    /// Compiles the keyword rules. A keyword matches a whole word (an optional plural `s`
    /// allowed), case-insensitively: "age" matches "Ages" but not "Agent".
    pub fn new(config: &'a PipelineConfig) -> Result<Self, PipelineError> {
        let rules = config
            .field_rules
            .iter()
            .filter(|rule| !rule.keyword.trim().is_empty())
            .map(|rule| {
                let pattern = format!(r"(?i)\b{}s?\b", regex::escape(rule.keyword.trim()));
                Regex::new(&pattern)
                    .map(|matcher| CompiledRule { rule, matcher })
                    .map_err(|e| ConfigError::InvalidPattern(pattern, e.to_string()).into())
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;
        Ok(HeaderSynthesizer {
            config,
            rules,
            classifier: config.classifier(),
        })
    }

    /// Synthesizes one candidate name per column of `grid`, not yet deduplicated.
    pub fn synthesize(&self, grid: &RawGrid, layout: &HeaderLayout) -> SynthesizedHeaders {
        let nulls = &self.config.null_literals;
        let main_row = layout.header_rows.first().copied();
        let sub_row = layout.header_rows.get(1).copied();
        let read = |row: Option<usize>, col: usize| {
            row.map(|row| normalize(&grid.text(row, col, nulls))).unwrap_or_default()
        };
        let mains: Vec<String> = (0..grid.width()).map(|col| read(main_row, col)).collect();
        let subs: Vec<String> = (0..grid.width()).map(|col| read(sub_row, col)).collect();

        let mut warnings = Vec::new();
        let mapped = self.assign_fields(&mains, &mut warnings);
        let names = mains
            .iter()
            .zip(&subs)
            .enumerate()
            .map(|(col, (main, sub))| {
                let name = match &mapped[col] {
                    _ if main.is_empty() && sub.is_empty() => self.placeholder(col),
                    Some(name) => name.to_owned(),
                    None => self.combine(main, sub),
                };
                let name = normalize(&name);
                if name.is_empty() {
                    format!("Question_{}", col + 1)
                } else {
                    self.shorten(name)
                }
            })
            .collect();
        SynthesizedHeaders { names, warnings }
    }

    /// Maps columns to canonical field names. The keyword is the primary signal; the
    /// expected position only breaks ties between candidate columns, and every mapping
    /// away from the expected position is reported.
    fn assign_fields(&self, mains: &[String], warnings: &mut Vec<String>) -> Vec<Option<String>> {
        let mut mapped = vec![None; mains.len()];
        let mut claimed = HashSet::new();
        let window = self.config.positional_window.min(mains.len());
        for CompiledRule { rule, matcher } in &self.rules {
            let chosen = (0..window)
                .filter(|col| !claimed.contains(col) && !self.is_classified(&mains[*col]))
                .filter(|col| matcher.is_match(&mains[*col]))
                .min_by_key(|col| (col.abs_diff(rule.position), *col));
            if let Some(col) = chosen {
                if col != rule.position {
                    warnings.push(format!(
                        "Column {} header '{}' matched keyword '{}' expected at column {}; mapped to '{}'",
                        col, mains[col], rule.keyword, rule.position, rule.name
                    ));
                }
                claimed.insert(col);
                mapped[col] = Some(rule.name.to_owned());
            }
        }
        mapped
    }

    /// Duration and sparse questions keep their own names so later stages still recognize them.
    fn is_classified(&self, main: &str) -> bool {
        self.classifier.is(main, FieldClass::Duration) || self.classifier.is(main, FieldClass::KnownSparse)
    }

    fn placeholder(&self, col: usize) -> String {
        if col == 0 {
            self.config.first_column_name.to_owned()
        } else {
            format!("Empty_Col_{col}")
        }
    }

    /// Main header with an optional parenthesized sub-header or unit suffix.
    fn combine(&self, main: &str, sub: &str) -> String {
        if main.is_empty() {
            return sub.to_owned();
        }
        if sub.is_empty() || sub == main {
            return main.to_owned();
        }
        let lowered = sub.to_lowercase();
        let unit = self
            .config
            .unit_suffixes
            .iter()
            .find(|unit| !unit.marker.is_empty() && lowered.contains(&unit.marker.to_lowercase()));
        match unit {
            Some(unit) => format!("{main} ({})", unit.suffix),
            None if sub.chars().count() < self.config.sub_header_max_len => format!("{main} ({sub})"),
            None => main.to_owned(),
        }
    }

    /// Applies known long-label rewrites, then truncates with an ellipsis.
    fn shorten(&self, name: String) -> String {
        let max = self.config.max_name_length;
        if name.chars().count() <= max {
            return name;
        }
        let lowered = name.to_lowercase();
        let rewrite = self.config.label_rewrites.iter().find(|rewrite| {
            !rewrite.keywords.is_empty()
                && rewrite
                    .keywords
                    .iter()
                    .all(|keyword| lowered.contains(&keyword.to_lowercase()))
        });
        if let Some(rewrite) = rewrite {
            return rewrite.label.to_owned();
        }
        let mut truncated: String = name.chars().take(max.saturating_sub(3)).collect();
        truncated.push_str("...");
        truncated
    }
}

/// Replaces line breaks with spaces and trims.
fn normalize(name: &str) -> String {
    name.replace(['\n', '\r'], " ").trim().to_owned()
}

/// Pads a candidate list with `Extra_Col_{i}` or truncates it to `width`.
pub fn fit_to_width(mut names: Vec<String>, width: usize) -> Vec<String> {
    names.truncate(width);
    let start = names.len();
    names.extend((start..width).map(|col| format!("Extra_Col_{col}")));
    names
}
