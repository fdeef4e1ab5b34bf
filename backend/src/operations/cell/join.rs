//! Join multi-valued cells of a record back into one cell.
//!
//! The inverse direction of [`super::split`]: within each record the values
//! of the target column are concatenated into the record's first row, and
//! rows left with nothing in them are dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{OperationError, OperationResult};
use crate::history::change::{Change, ChangeBuilder};
use crate::models::{Cell, Grid, Row};
use crate::operations::{
    renamed, require_column, require_non_blank, ColumnRenames, ColumnsDiff, Operation,
};

pub const JOIN_OP_ID: &str = "core/multivalued-cell-join";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiValuedCellJoinOperation {
    #[serde(default)]
    pub column_name: String,

    #[serde(default)]
    pub key_column_name: String,

    #[serde(default)]
    pub separator: String,
}

impl MultiValuedCellJoinOperation {
    pub fn new(
        column_name: impl Into<String>,
        key_column_name: impl Into<String>,
        separator: impl Into<String>,
    ) -> Self {
        Self {
            column_name: column_name.into(),
            key_column_name: key_column_name.into(),
            separator: separator.into(),
        }
    }

    /// Rows replacing `rows`, the physical rows of one record.
    fn join_record(&self, rows: &[Arc<Row>], target: usize) -> Vec<Row> {
        let values: Vec<String> = rows
            .iter()
            .map(|row| row.cell(target))
            .filter(|cell| !cell.is_blank())
            .filter_map(Cell::to_text)
            .collect();

        let mut out = Vec::with_capacity(1);
        if let Some((first, rest)) = rows.split_first() {
            // Nothing to join keeps the first cell as it was
            let joined = if values.is_empty() {
                first.cell(target).clone()
            } else {
                Cell::String(values.join(&self.separator))
            };
            out.push(first.as_ref().clone().with_cell(target, joined));
            out.extend(
                rest.iter()
                    .map(|row| row.as_ref().clone().with_cell(target, Cell::Absent))
                    .filter(|row| !row.cells.iter().all(Cell::is_absent)),
            );
        }
        out
    }
}

impl Operation for MultiValuedCellJoinOperation {
    fn op_id(&self) -> &'static str {
        JOIN_OP_ID
    }

    fn description(&self) -> String {
        format!("Join multi-valued cells in column {}", self.column_name)
    }

    fn validate(&self) -> OperationResult<()> {
        require_non_blank("columnName", &self.column_name)?;
        require_non_blank("keyColumnName", &self.key_column_name)?;
        if self.separator.is_empty() {
            return Err(OperationError::invalid("separator is required"));
        }
        Ok(())
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
        Box::new(Self {
            column_name: renamed(renames, &self.column_name),
            key_column_name: renamed(renames, &self.key_column_name),
            separator: self.separator.clone(),
        })
    }

    fn parameters(&self) -> OperationResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn create_change(&self, grid: &Grid, _config: &EngineConfig) -> OperationResult<Change> {
        let target = require_column(grid, &self.column_name)?;
        let key = require_column(grid, &self.key_column_name)?;

        let mut builder = ChangeBuilder::new(grid);
        for span in grid.records(key) {
            let rows = &grid.rows()[span.rows.clone()];
            // Single rows have nothing to join; keyless leading rows are not a record
            if rows.len() < 2 || rows[0].cell(key).is_blank() {
                continue;
            }
            builder.replace(span.rows, self.join_record(rows, target));
        }
        Ok(builder.build())
    }

    fn clone_box(&self) -> Box<dyn Operation> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::cell::MultiValuedCellSplitOperation;
    use crate::operations::registry::OperationRegistry;
    use serde_json::json;

    fn run(op: &dyn Operation, grid: &Grid) -> Grid {
        op.validate().unwrap();
        let change = op.create_change(grid, &EngineConfig::default()).unwrap();
        change.apply(grid).unwrap()
    }

    fn values(grid: &Grid) -> Vec<Vec<Cell>> {
        grid.rows().iter().map(|r| r.cells.clone()).collect()
    }

    #[test]
    fn test_serialize() {
        let doc = json!({
            "op": JOIN_OP_ID,
            "description": "Join multi-valued cells in column Value",
            "columnName": "Value",
            "keyColumnName": "Key",
            "separator": ","
        });
        let op = OperationRegistry::with_core().deserialize(&doc).unwrap();
        assert_eq!(op.to_json().unwrap(), doc);
    }

    #[test]
    fn test_validate() {
        assert!(MultiValuedCellJoinOperation::new("", "k", ",").validate().is_err());
        assert!(MultiValuedCellJoinOperation::new("v", " ", ",").validate().is_err());
        assert!(MultiValuedCellJoinOperation::new("v", "k", "").validate().is_err());
        assert!(MultiValuedCellJoinOperation::new("v", "k", ",").validate().is_ok());
    }

    #[test]
    fn test_join() {
        let grid = Grid::from_values(
            &["key", "foo", "bar"],
            vec![
                vec![Cell::from("r1"), Cell::from("a"), Cell::from("x")],
                vec![Cell::Absent, Cell::from("b"), Cell::Absent],
                vec![Cell::Absent, Cell::from(3i64), Cell::from("y")],
                vec![Cell::Absent, Cell::from(""), Cell::Absent],
                vec![Cell::from("r2"), Cell::from("c"), Cell::Absent],
            ],
        )
        .unwrap();

        let op = MultiValuedCellJoinOperation::new("foo", "key", "|");
        assert_eq!(
            values(&run(&op, &grid)),
            vec![
                vec![Cell::from("r1"), Cell::from("a|b|3"), Cell::from("x")],
                vec![Cell::Absent, Cell::Absent, Cell::from("y")],
                vec![Cell::from("r2"), Cell::from("c"), Cell::Absent],
            ]
        );
    }

    #[test]
    fn test_leading_keyless_rows_are_untouched() {
        let grid = Grid::from_values(
            &["key", "foo"],
            vec![vec![None, Some("a")], vec![None, Some("b")], vec![Some("r1"), Some("c")]],
        )
        .unwrap();
        let op = MultiValuedCellJoinOperation::new("foo", "key", ",");
        let change = op.create_change(&grid, &EngineConfig::default()).unwrap();
        assert!(change.is_empty());
    }

    #[test]
    fn test_join_restores_split() {
        let grid = Grid::from_values(
            &["key", "foo"],
            vec![vec!["r1", "a|b|c"], vec!["r2", "d"], vec!["r3", "e|f"]],
        )
        .unwrap();

        let split = MultiValuedCellSplitOperation::new("foo", "key", "|", false);
        let expanded = run(&split, &grid);
        assert_eq!(expanded.row_count(), 6);

        let join = MultiValuedCellJoinOperation::new("foo", "key", "|");
        assert_eq!(run(&join, &expanded), grid);
    }

    #[test]
    fn test_rename() {
        let op = MultiValuedCellJoinOperation::new("foo", "key", ",");
        let renames: ColumnRenames = [("key".to_string(), "id".to_string())].into();
        let json = op.rename_columns(&renames).to_json().unwrap();
        assert_eq!(json["keyColumnName"], "id");
        assert_eq!(json["columnName"], "foo");
    }
}
