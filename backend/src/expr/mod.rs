//! Expression evaluation boundary.
//!
//! The engine does not parse expressions itself. An [`Evaluator`] is plugged
//! in by the host; this module defines what it sees ([`RowContext`]) and how
//! its results and parse failures are reported back ([`PreviewResponse`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, ErrorKind, ParseError};
use crate::models::{Cell, Column, Grid, Row};

/// Language assumed when an expression carries no `lang:` prefix.
pub const DEFAULT_LANGUAGE: &str = "grel";

/// Row-level view handed to an evaluator.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub row_index: usize,
    pub row: &'a Row,
    pub columns: &'a [Column],
    /// Column the expression is evaluated for (`value` in the expression).
    pub cell_index: usize,
}

impl<'a> RowContext<'a> {
    /// The focused cell.
    pub fn value(&self) -> &'a Cell {
        self.row.cell(self.cell_index)
    }

    /// Cell of another column, by name.
    pub fn column(&self, name: &str) -> Option<&'a Cell> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .map(|i| self.row.cell(i))
    }
}

/// Expression language implementation supplied by the host.
pub trait Evaluator: Send + Sync {
    /// Language name matched against the expression prefix.
    fn language(&self) -> &str {
        DEFAULT_LANGUAGE
    }

    /// Evaluate `expression` (without its language prefix) against one row.
    ///
    /// Runtime failures belong in the returned cell as [`Cell::Error`]; only a
    /// malformed expression is an `Err`.
    fn evaluate(&self, expression: &str, context: &RowContext<'_>) -> Result<Cell, ParseError>;
}

/// Split `"lang:body"` into its language and body.
///
/// Only a leading run of ASCII letters counts as a prefix, so `value + ":"`
/// stays a plain expression in the default language.
pub fn split_language_prefix(expression: &str) -> (&str, &str) {
    match expression.split_once(':') {
        Some((lang, body)) if !lang.is_empty() && lang.chars().all(|c| c.is_ascii_alphabetic()) => {
            (lang, body)
        }
        _ => (DEFAULT_LANGUAGE, expression),
    }
}

/// Result of previewing an expression over some rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "lowercase")]
pub enum PreviewResponse {
    Ok {
        /// One entry per requested row; `null` for rows that do not exist.
        results: Vec<Value>,
    },
    Error {
        #[serde(rename = "type")]
        kind: ErrorKind,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset: Option<usize>,
    },
}

impl From<EngineError> for PreviewResponse {
    fn from(err: EngineError) -> Self {
        let report = err.report();
        PreviewResponse::Error {
            kind: report.kind,
            message: report.message,
            offset: report.offset,
        }
    }
}

/// Evaluate `expression` for the cell at `cell_index` of each requested row.
pub fn preview_expression(
    grid: &Grid,
    cell_index: usize,
    expression: &str,
    row_indices: &[usize],
    evaluator: &dyn Evaluator,
) -> PreviewResponse {
    let (language, body) = split_language_prefix(expression);
    if language != evaluator.language() {
        return PreviewResponse::Error {
            kind: ErrorKind::InvalidArgument,
            message: format!("Unsupported expression language: {}", language),
            offset: None,
        };
    }
    if cell_index >= grid.columns().len() {
        return PreviewResponse::Error {
            kind: ErrorKind::InvalidArgument,
            message: format!("No column at index {}", cell_index),
            offset: None,
        };
    }

    let mut results = Vec::with_capacity(row_indices.len());
    for &row_index in row_indices {
        let Some(row) = grid.row(row_index) else {
            results.push(Value::Null);
            continue;
        };
        let context = RowContext {
            row_index,
            row,
            columns: grid.columns(),
            cell_index,
        };
        match evaluator.evaluate(body, &context) {
            Ok(cell) => results.push(Value::from(cell)),
            Err(err) => {
                tracing::debug!(expression = body, offset = err.offset, "expression failed to parse");
                return EngineError::from(err).into();
            }
        }
    }
    PreviewResponse::Ok { results }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Understands `value` and `value + "literal"`.
    struct Concat;

    impl Evaluator for Concat {
        fn evaluate(&self, expression: &str, context: &RowContext<'_>) -> Result<Cell, ParseError> {
            let rest = expression
                .strip_prefix("value")
                .ok_or_else(|| ParseError::new(0, "Unknown identifier"))?;
            let rest = rest.trim_start();
            if rest.is_empty() {
                return Ok(context.value().clone());
            }
            let operand = rest
                .strip_prefix('+')
                .ok_or_else(|| ParseError::new(expression.len() - rest.len(), "Unexpected token"))?
                .trim();
            if operand.is_empty() {
                return Err(ParseError::new(
                    expression.len(),
                    "Expecting something more at end of expression",
                ));
            }
            let literal = operand
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .ok_or_else(|| ParseError::new(expression.len() - operand.len(), "Expecting a string"))?;

            Ok(match context.value().to_text() {
                Some(text) => Cell::String(text + literal),
                None => Cell::Absent,
            })
        }
    }

    fn grid() -> Grid {
        Grid::from_values(&["a", "b"], vec![vec!["c", "d"], vec!["e", "f"], vec!["g", "h"]])
            .unwrap()
    }

    #[test]
    fn test_preview_results() {
        let response = preview_expression(&grid(), 1, "grel:value + \"_u\"", &[0, 2], &Concat);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"code": "ok", "results": ["d_u", "h_u"]})
        );
    }

    #[test]
    fn test_preview_parse_error() {
        let response = preview_expression(&grid(), 1, "grel:value +", &[0, 2], &Concat);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "code": "error",
                "type": "parser",
                "message": "Parsing error at offset 7: Expecting something more at end of expression",
                "offset": 7
            })
        );
    }

    #[test]
    fn test_out_of_range_rows_are_null() {
        let response = preview_expression(&grid(), 0, "value", &[1, 10], &Concat);
        assert_eq!(
            response,
            PreviewResponse::Ok {
                results: vec![json!("e"), Value::Null]
            }
        );
    }

    #[test]
    fn test_out_of_range_cell_index_is_rejected() {
        let response = preview_expression(&grid(), 2, "value", &[0], &Concat);
        assert_eq!(
            response,
            PreviewResponse::Error {
                kind: ErrorKind::InvalidArgument,
                message: "No column at index 2".to_string(),
                offset: None,
            }
        );
    }

    #[test]
    fn test_language_prefix() {
        assert_eq!(split_language_prefix("grel:value"), ("grel", "value"));
        assert_eq!(split_language_prefix("value + \":\""), ("grel", "value + \":\""));
        assert_eq!(split_language_prefix("value"), ("grel", "value"));

        let response = preview_expression(&grid(), 0, "jython:return value", &[0], &Concat);
        assert!(matches!(
            response,
            PreviewResponse::Error { kind: ErrorKind::InvalidArgument, .. }
        ));
    }

    #[test]
    fn test_row_context_lookup() {
        let g = grid();
        let context = RowContext {
            row_index: 0,
            row: g.row(0).unwrap(),
            columns: g.columns(),
            cell_index: 1,
        };
        assert_eq!(context.value(), &Cell::from("d"));
        assert_eq!(context.column("a"), Some(&Cell::from("c")));
        assert_eq!(context.column("z"), None);
    }
}
