//! Column-level operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::config::EngineConfig;
use crate::error::OperationResult;
use crate::history::change::{Change, ChangeBuilder};
use crate::models::{Grid, Row};
use crate::operations::{
    map_rows, renamed, require_column, require_non_blank, ColumnRenames, ColumnsDiff, Operation,
};

pub const COLUMN_REMOVAL_OP_ID: &str = "core/column-removal";

/// Removes one column and its cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRemovalOperation {
    #[serde(default)]
    pub column_name: String,
}

impl ColumnRemovalOperation {
    pub fn new(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
        }
    }
}

impl Operation for ColumnRemovalOperation {
    fn op_id(&self) -> &'static str {
        COLUMN_REMOVAL_OP_ID
    }

    fn description(&self) -> String {
        format!("Remove column {}", self.column_name)
    }

    fn validate(&self) -> OperationResult<()> {
        require_non_blank("columnName", &self.column_name)
    }

    fn column_dependencies(&self) -> Option<BTreeSet<String>> {
        Some(BTreeSet::from([self.column_name.clone()]))
    }

    fn columns_diff(&self) -> Option<ColumnsDiff> {
        Some(ColumnsDiff::delete_columns(vec![self.column_name.clone()]))
    }

    fn rename_columns(&self, renames: &ColumnRenames) -> Box<dyn Operation> {
        Box::new(Self::new(renamed(renames, &self.column_name)))
    }

    fn parameters(&self) -> OperationResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn create_change(&self, grid: &Grid, config: &EngineConfig) -> OperationResult<Change> {
        let index = require_column(grid, &self.column_name)?;

        let mut columns = grid.columns().to_vec();
        columns.remove(index);

        let rows = map_rows(grid, config, |row| {
            let mut cells = row.cells.clone();
            cells.remove(index);
            Row::new(cells)
        });

        let mut builder = ChangeBuilder::new(grid);
        builder.set_columns(columns);
        builder.replace(0..grid.row_count(), rows);
        Ok(builder.build())
    }

    fn clone_box(&self) -> Box<dyn Operation> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;
    use serde_json::json;

    fn grid() -> Grid {
        Grid::from_values(&["a", "b", "c"], vec![vec!["1", "2", "3"], vec!["4", "5", "6"]]).unwrap()
    }

    #[test]
    fn test_remove_column() {
        let g = grid();
        let op = ColumnRemovalOperation::new("b");
        let change = op.create_change(&g, &EngineConfig::default()).unwrap();
        let result = change.apply(&g).unwrap();

        assert_eq!(result.column_names(), vec!["a", "c"]);
        assert_eq!(result.rows()[1].cells, vec![Cell::from("4"), Cell::from("6")]);
        assert_eq!(change.revert(&result).unwrap(), g);
    }

    #[test]
    fn test_remove_column_from_empty_grid() {
        let g = Grid::from_values::<&str, _>(&["a", "b"], vec![]).unwrap();
        let op = ColumnRemovalOperation::new("a");
        let change = op.create_change(&g, &EngineConfig::default()).unwrap();
        let result = change.apply(&g).unwrap();
        assert_eq!(result.column_names(), vec!["b"]);
        assert_eq!(result.row_count(), 0);
    }

    #[test]
    fn test_metadata() {
        let op = ColumnRemovalOperation::new("b");
        assert_eq!(
            op.to_json().unwrap(),
            json!({"op": "core/column-removal", "description": "Remove column b", "columnName": "b"})
        );
        assert_eq!(
            op.columns_diff(),
            Some(ColumnsDiff::delete_columns(vec!["b".to_string()]))
        );
        let renames: ColumnRenames = [("b".to_string(), "bee".to_string())].into();
        assert_eq!(op.rename_columns(&renames).to_json().unwrap()["columnName"], "bee");
        assert!(ColumnRemovalOperation::new("").validate().is_err());
    }
}
