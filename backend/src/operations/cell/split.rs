//! Split multi-valued cells into rows.
//!
//! A cell holding several values (`"a|b|c"`, or fixed-width `"aaabbbccc"`) is
//! expanded into one row per value. The first row keeps the original row's
//! other cells, including the key column; every following row holds only the
//! next value, so it reads as a continuation of the record the first row
//! starts.
//!
//! ```text
//! Key       Value               Key       Value
//! Record_1  one:two;three  →    Record_1  one
//!                               (null)    two;three
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::config::EngineConfig;
use crate::error::{OperationError, OperationResult};
use crate::history::change::{Change, ChangeBuilder};
use crate::models::{Cell, Grid, Row};
use crate::operations::{
    map_rows, renamed, require_column, require_non_blank, ColumnRenames, ColumnsDiff, Operation,
};

pub const SPLIT_OP_ID: &str = "core/multivalued-cell-split";

/// How a cell's string value is cut into parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum SplitMode {
    /// Split on every occurrence of a literal string or regular expression.
    Separator {
        #[serde(default)]
        separator: String,
        #[serde(default)]
        regex: bool,
    },

    /// Cut consecutive substrings of the given character counts.
    Lengths {
        #[serde(rename = "fieldLengths")]
        field_lengths: Vec<usize>,
    },
}

/// Splits one column's cells into multiple rows, anchored on a key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiValuedCellSplitOperation {
    #[serde(default)]
    pub column_name: String,

    #[serde(default)]
    pub key_column_name: String,

    #[serde(flatten)]
    pub mode: SplitMode,
}

impl MultiValuedCellSplitOperation {
    /// Split on a separator, literal or regular expression.
    pub fn new(
        column_name: impl Into<String>,
        key_column_name: impl Into<String>,
        separator: impl Into<String>,
        regex: bool,
    ) -> Self {
        Self {
            column_name: column_name.into(),
            key_column_name: key_column_name.into(),
            mode: SplitMode::Separator {
                separator: separator.into(),
                regex,
            },
        }
    }

    /// Split into fixed-width fields.
    pub fn with_lengths(
        column_name: impl Into<String>,
        key_column_name: impl Into<String>,
        field_lengths: Vec<usize>,
    ) -> Self {
        Self {
            column_name: column_name.into(),
            key_column_name: key_column_name.into(),
            mode: SplitMode::Lengths { field_lengths },
        }
    }

    /// Same configuration with column references rewritten.
    pub fn renamed(&self, renames: &ColumnRenames) -> Self {
        Self {
            column_name: renamed(renames, &self.column_name),
            key_column_name: renamed(renames, &self.key_column_name),
            mode: self.mode.clone(),
        }
    }

    fn splitter(&self) -> OperationResult<Splitter<'_>> {
        match &self.mode {
            SplitMode::Separator { separator, regex } => {
                if separator.is_empty() {
                    return Err(OperationError::invalid("separator is required"));
                }
                if *regex {
                    Ok(Splitter::Pattern(Pattern::compile(separator)?))
                } else {
                    Ok(Splitter::Literal(separator))
                }
            }
            SplitMode::Lengths { field_lengths } => {
                if field_lengths.contains(&0) {
                    return Err(OperationError::invalid("field lengths must be positive"));
                }
                Ok(Splitter::Lengths(field_lengths))
            }
        }
    }

    /// Rows produced from `row`, or `None` when it passes through unchanged.
    fn expand(&self, row: &Row, target: usize, splitter: &Splitter<'_>) -> Option<Vec<Row>> {
        // Only strings split; other cell types pass through untouched
        let value = row.cell(target).as_str()?;
        let parts = splitter.split(value);
        if parts.len() < 2 {
            return None;
        }

        let width = row.cells.len();
        let mut parts = parts.into_iter();
        let first = parts.next().map(Cell::String).unwrap_or_default();

        let mut rows = Vec::with_capacity(parts.len() + 1);
        rows.push(row.clone().with_cell(target, first));
        rows.extend(parts.map(|part| Row::blank(width).with_cell(target, Cell::String(part))));
        Some(rows)
    }
}

enum Splitter<'a> {
    Literal(&'a str),
    Pattern(Pattern),
    Lengths(&'a [usize]),
}

impl Splitter<'_> {
    fn split(&self, value: &str) -> Vec<String> {
        match self {
            Splitter::Literal(sep) => value.split(*sep).map(str::to_string).collect(),
            Splitter::Pattern(pattern) => pattern.split(value),
            Splitter::Lengths(lengths) => split_lengths(value, lengths),
        }
    }
}

/// A compiled separator pattern.
///
/// Patterns the `regex` crate accepts run on it. Look-around and
/// backreferences, which saved documents use for case and digit boundaries,
/// fall back to the backtracking engine.
enum Pattern {
    Plain(Regex),
    Fancy(fancy_regex::Regex),
}

impl Pattern {
    fn compile(separator: &str) -> OperationResult<Self> {
        if let Ok(re) = Regex::new(separator) {
            return Ok(Pattern::Plain(re));
        }
        fancy_regex::Regex::new(separator)
            .map(Pattern::Fancy)
            .map_err(|e| OperationError::invalid(format!("invalid separator pattern: {}", e)))
    }

    fn split(&self, value: &str) -> Vec<String> {
        match self {
            Pattern::Plain(re) => re.split(value).map(str::to_string).collect(),
            Pattern::Fancy(re) => {
                let mut parts = Vec::new();
                let mut last = 0;
                for found in re.find_iter(value) {
                    match found {
                        Ok(m) => {
                            parts.push(value[last..m.start()].to_string());
                            last = m.end();
                        }
                        Err(e) => {
                            // Backtrack limit hit: leave the value whole
                            tracing::warn!(error = %e, "separator pattern failed, value left unsplit");
                            return vec![value.to_string()];
                        }
                    }
                }
                parts.push(value[last..].to_string());
                parts
            }
        }
    }
}

/// Cut `value` into consecutive runs of `lengths` characters.
///
/// A remainder after the last length becomes one more part. Parts stop once
/// the string is exhausted, so a length past the end yields a short last part.
fn split_lengths(value: &str, lengths: &[usize]) -> Vec<String> {
    let mut parts = Vec::with_capacity(lengths.len() + 1);
    let mut rest = value;

    for &len in lengths {
        if rest.is_empty() {
            break;
        }
        let end = rest
            .char_indices()
            .nth(len)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        parts.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    if !rest.is_empty() || parts.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

impl Operation for MultiValuedCellSplitOperation {
    fn op_id(&self) -> &'static str {
        SPLIT_OP_ID
    }

    fn description(&self) -> String {
        format!("Split multi-valued cells in column {}", self.column_name)
    }

    fn validate(&self) -> OperationResult<()> {
        require_non_blank("columnName", &self.column_name)?;
        require_non_blank("keyColumnName", &self.key_column_name)?;
        self.splitter().map(|_| ())
    }

    fn column_dependencies(&self) -> Option<BTreeSet<String>> {
        Some(BTreeSet::from([
            self.column_name.clone(),
            self.key_column_name.clone(),
        ]))
    }

    fn columns_diff(&self) -> Option<ColumnsDiff> {
        Some(ColumnsDiff::modify_single_column(&self.column_name))
    }

    fn rename_columns(&self, renames: &ColumnRenames) -> Box<dyn Operation> {
        Box::new(self.renamed(renames))
    }

    fn parameters(&self) -> OperationResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn create_change(&self, grid: &Grid, config: &EngineConfig) -> OperationResult<Change> {
        let target = require_column(grid, &self.column_name)?;
        require_column(grid, &self.key_column_name)?;
        let splitter = self.splitter()?;

        let expanded = map_rows(grid, config, |row| self.expand(row, target, &splitter));

        let mut builder = ChangeBuilder::new(grid);
        let mut skipped = 0usize;
        for (i, rows) in expanded.into_iter().enumerate() {
            match rows {
                Some(rows) => {
                    builder.replace(i..i + 1, rows);
                }
                None => {
                    let cell = grid.rows()[i].cell(target);
                    if !cell.is_absent() && cell.as_str().is_none() {
                        skipped += 1;
                    }
                }
            }
        }
        if skipped > 0 {
            tracing::debug!(
                column = %self.column_name,
                skipped,
                "non-string cells left unsplit"
            );
        }

        Ok(builder.build())
    }

    fn clone_box(&self) -> Box<dyn Operation> {
        Box::new(self.clone())
    }
}
