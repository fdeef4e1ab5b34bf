//! Operations: serializable descriptors of grid transformations.
//!
//! This module provides:
//! - [`Operation`]: the contract every transformation implements
//! - [`ColumnsDiff`]: declarative effect of an operation on the column set
//! - `registry`: identifier → deserializer map used to load persisted operations
//! - `migration`: upgrades legacy JSON shapes before deserialization
//! - `cell`, `column`: the concrete operations
//!
//! ## Usage Flow
//!
//! ```text
//! JSON → registry::deserialize → Box<dyn Operation> → validate → create_change → Change
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use tabula::operations::{registry::OPERATION_REGISTRY, Operation};
//!
//! let op = OPERATION_REGISTRY.deserialize(&serde_json::json!({
//!     "op": "core/multivalued-cell-split",
//!     "columnName": "Value",
//!     "keyColumnName": "Key",
//!     "mode": "plain",
//!     "separator": ":"
//! }))?;
//! op.validate()?;
//! let change = op.create_change(&grid, &config)?;
//! ```

pub mod cell;
pub mod column;
pub mod migration;
pub mod registry;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::config::EngineConfig;
use crate::error::{OperationError, OperationResult};
use crate::history::change::Change;
use crate::models::{Grid, Row};

/// Old column name → new column name.
pub type ColumnRenames = HashMap<String, String>;

/// How an operation changes the column set, independent of row changes.
///
/// A `ModifySingleColumn` diff says nothing about row count: the split
/// operation adds rows and still reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ColumnsDiff {
    NoChange,
    ModifySingleColumn {
        column: String,
    },
    #[serde(rename_all = "camelCase")]
    AddColumns {
        after_column: String,
        added: Vec<String>,
    },
    DeleteColumns {
        deleted: Vec<String>,
    },
}

impl ColumnsDiff {
    pub fn modify_single_column(column: impl Into<String>) -> Self {
        ColumnsDiff::ModifySingleColumn {
            column: column.into(),
        }
    }

    pub fn add_columns_after(after: impl Into<String>, added: Vec<String>) -> Self {
        ColumnsDiff::AddColumns {
            after_column: after.into(),
            added,
        }
    }

    pub fn delete_columns(deleted: Vec<String>) -> Self {
        ColumnsDiff::DeleteColumns { deleted }
    }
}

/// Contract every grid transformation implements.
///
/// Operations carry configuration only. They never hold a grid; the history
/// engine hands them a snapshot and keeps the [`Change`] they produce.
pub trait Operation: fmt::Debug + Send + Sync {
    /// Registry identifier, `module/operation-name`.
    fn op_id(&self) -> &'static str;

    /// Human-readable summary, regenerated on every call.
    fn description(&self) -> String;

    /// Check the configuration without looking at any grid.
    fn validate(&self) -> OperationResult<()>;

    /// Every column this operation reads. `None` means "unknown", which forces
    /// callers to treat the operation as depending on all columns.
    fn column_dependencies(&self) -> Option<BTreeSet<String>>;

    fn columns_diff(&self) -> Option<ColumnsDiff>;

    /// Copy of this operation with column references rewritten.
    fn rename_columns(&self, renames: &ColumnRenames) -> Box<dyn Operation>;

    /// Operation-specific fields as a JSON object, without `op` and `description`.
    fn parameters(&self) -> OperationResult<Value>;

    /// Compute the effect of this operation on `grid`.
    fn create_change(&self, grid: &Grid, config: &EngineConfig) -> OperationResult<Change>;

    fn clone_box(&self) -> Box<dyn Operation>;

    /// Canonical JSON form, including `op` and a fresh `description`.
    fn to_json(&self) -> OperationResult<Value> {
        let mut value = self.parameters()?;
        let obj = value
            .as_object_mut()
            .ok_or_else(|| OperationError::invalid("operation parameters must be a JSON object"))?;
        obj.insert("op".to_string(), Value::String(self.op_id().to_string()));
        obj.insert("description".to_string(), Value::String(self.description()));
        Ok(value)
    }
}

impl Clone for Box<dyn Operation> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Look up a renamed column, falling back to the current name.
pub(crate) fn renamed(renames: &ColumnRenames, name: &str) -> String {
    renames.get(name).cloned().unwrap_or_else(|| name.to_string())
}

pub(crate) fn require_column(grid: &Grid, name: &str) -> OperationResult<usize> {
    grid.column_index(name)
        .ok_or_else(|| OperationError::ColumnNotFound(name.to_string()))
}

pub(crate) fn require_non_blank(field: &str, value: &str) -> OperationResult<()> {
    if value.trim().is_empty() {
        return Err(OperationError::invalid(format!("{} is required", field)));
    }
    Ok(())
}

/// Map every row through `f`, preserving row order.
///
/// With the `parallel` feature, grids at or above the configured threshold are
/// processed on the rayon pool.
pub(crate) fn map_rows<T, F>(grid: &Grid, config: &EngineConfig, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&Row) -> T + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        if grid.row_count() >= config.parallel_row_threshold {
            use rayon::prelude::*;
            return grid.rows().par_iter().map(|row| f(row.as_ref())).collect();
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = config;

    grid.rows().iter().map(|row| f(row.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_columns_diff_json() {
        assert_eq!(
            serde_json::to_value(ColumnsDiff::modify_single_column("Value")).unwrap(),
            json!({"type": "modifySingleColumn", "column": "Value"})
        );
        assert_eq!(
            serde_json::to_value(ColumnsDiff::add_columns_after("a", vec!["b".into()])).unwrap(),
            json!({"type": "addColumns", "afterColumn": "a", "added": ["b"]})
        );
    }

    #[test]
    fn test_renamed_falls_back() {
        let renames: ColumnRenames = [("a".to_string(), "b".to_string())].into();
        assert_eq!(renamed(&renames, "a"), "b");
        assert_eq!(renamed(&renames, "c"), "c");
    }

    #[test]
    fn test_map_rows_keeps_order() {
        let grid = Grid::from_values(&["n"], (0..50i64).map(|i| vec![i])).unwrap();
        let config = EngineConfig {
            parallel_row_threshold: 1,
            ..EngineConfig::default()
        };
        let out = map_rows(&grid, &config, |row| row.cell(0).clone());
        let expected: Vec<_> = grid.rows().iter().map(|r| r.cell(0).clone()).collect();
        assert_eq!(out, expected);
    }
}
