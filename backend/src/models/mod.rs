//! Value model for project grids.
//!
//! This module contains the data structures every operation reads and writes:
//!
//! - [`Cell`] - typed cell value (absent, string, number, boolean, error, rich text)
//! - [`Row`] - one cell per column
//! - [`Column`] - named column
//! - [`Grid`] - ordered columns plus `Arc`-shared rows
//! - [`RecordSpan`] - rows grouped under a key column
//!
//! Grids are values: an operation never edits a grid in place, it builds a new
//! one that shares every untouched row with its predecessor.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};
use std::collections::HashSet;
use std::fs;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use crate::error::{GridError, GridResult};

// =============================================================================
// Cells
// =============================================================================

/// A single cell value.
///
/// JSON form: `null`, string, number, boolean, `{"error": "..."}` or
/// `{"richText": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Cell {
    /// No value. Distinct from the empty string.
    #[default]
    Absent,
    String(String),
    Number(Number),
    Boolean(bool),
    /// Evaluation error kept in the grid.
    Error(String),
    /// Formatted text; its plain text is not treated as splittable.
    RichText(String),
}

impl Cell {
    pub fn string(s: impl Into<String>) -> Self {
        Cell::String(s.into())
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Cell::Absent)
    }

    /// Absent or the empty string.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Absent => true,
            Cell::String(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::String(s) => Some(s),
            _ => None,
        }
    }

    /// Text rendering used when values are concatenated.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Cell::Absent => None,
            Cell::String(s) | Cell::Error(s) | Cell::RichText(s) => Some(s.clone()),
            Cell::Number(n) => Some(n.to_string()),
            Cell::Boolean(b) => Some(b.to_string()),
        }
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Cell::Absent,
            Value::String(s) => Cell::String(s),
            Value::Number(n) => Cell::Number(n),
            Value::Bool(b) => Cell::Boolean(b),
            Value::Object(mut obj) => {
                if let Some(Value::String(msg)) = obj.remove("error") {
                    Cell::Error(msg)
                } else if let Some(Value::String(text)) = obj.remove("richText") {
                    Cell::RichText(text)
                } else {
                    Cell::Error(format!("unsupported cell object: {}", Value::Object(obj)))
                }
            }
            Value::Array(items) => Cell::Error(format!(
                "unsupported cell array of {} items",
                items.len()
            )),
        }
    }
}

impl From<Cell> for Value {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Absent => Value::Null,
            Cell::String(s) => Value::String(s),
            Cell::Number(n) => Value::Number(n),
            Cell::Boolean(b) => Value::Bool(b),
            Cell::Error(msg) => json!({ "error": msg }),
            Cell::RichText(text) => json!({ "richText": text }),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::String(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::String(s)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Number(n.into())
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Boolean(b)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Absent)
    }
}

// =============================================================================
// Rows and Columns
// =============================================================================

/// One row of a grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// A row of `width` absent cells.
    pub fn blank(width: usize) -> Self {
        Self {
            cells: vec![Cell::Absent; width],
        }
    }

    /// Panics if `index` is past the row's width.
    pub fn cell(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    /// Panics if `index` is past the row's width.
    pub fn with_cell(mut self, index: usize, cell: Cell) -> Self {
        self.cells[index] = cell;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Cell::is_blank)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

// =============================================================================
// Grid
// =============================================================================

/// Project state: columns plus rows.
///
/// Every row holds exactly one cell per column. Rows are reference-counted so
/// successive grid versions share the rows an operation did not touch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GridDocument", into = "GridDocument")]
pub struct Grid {
    columns: Vec<Column>,
    rows: Vec<Arc<Row>>,
}

/// Serialized shape of a grid: `{"columns": ["a", ...], "rows": [[...], ...]}`.
#[derive(Serialize, Deserialize)]
struct GridDocument {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl TryFrom<GridDocument> for Grid {
    type Error = GridError;

    fn try_from(doc: GridDocument) -> GridResult<Self> {
        Grid::new(
            doc.columns.into_iter().map(Column::new).collect(),
            doc.rows,
        )
    }
}

impl From<Grid> for GridDocument {
    fn from(grid: Grid) -> Self {
        GridDocument {
            columns: grid.columns.into_iter().map(|c| c.name).collect(),
            rows: grid
                .rows
                .into_iter()
                .map(|r| Arc::try_unwrap(r).unwrap_or_else(|shared| (*shared).clone()))
                .collect(),
        }
    }
}

impl Grid {
    /// Build a grid, checking the one-cell-per-column invariant.
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> GridResult<Self> {
        Self::from_shared(columns, rows.into_iter().map(Arc::new).collect())
    }

    pub(crate) fn from_shared(columns: Vec<Column>, rows: Vec<Arc<Row>>) -> GridResult<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(GridError::DuplicateColumn(column.name.clone()));
            }
        }
        for (i, row) in rows.iter().enumerate() {
            if row.cells.len() != columns.len() {
                return Err(GridError::RaggedRow {
                    row: i,
                    expected: columns.len(),
                    found: row.cells.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Convenience constructor from column names and row values.
    pub fn from_values<C, R>(columns: &[&str], rows: R) -> GridResult<Self>
    where
        R: IntoIterator<Item = Vec<C>>,
        C: Into<Cell>,
    {
        Self::new(
            columns.iter().map(|c| Column::new(*c)).collect(),
            rows.into_iter()
                .map(|cells| Row::new(cells.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn rows(&self) -> &[Arc<Row>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index).map(|r| r.as_ref())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Group rows into records anchored on the key column.
    ///
    /// A record starts at a row whose key cell is not blank and runs until the
    /// next such row. Leading rows before the first key form a record of their own.
    pub fn records(&self, key_index: usize) -> Vec<RecordSpan> {
        let mut spans: Vec<RecordSpan> = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            let starts = !row.cell(key_index).is_blank();
            match spans.last_mut() {
                Some(span) if !starts => span.rows.end = i + 1,
                _ => spans.push(RecordSpan { rows: i..i + 1 }),
            }
        }
        spans
    }

    pub fn from_json_file(path: &Path) -> GridResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn to_json_file(&self, path: &Path) -> GridResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Row values as JSON, handy for diagnostics.
    pub fn rows_json(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let obj: Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(row.cells.iter())
                    .map(|(col, cell)| (col.name.clone(), Value::from(cell.clone())))
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }
}

/// A logical record: a run of physical rows under one key value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpan {
    pub rows: Range<usize>,
}
