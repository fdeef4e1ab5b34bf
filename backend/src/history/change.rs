//! Reversible grid changes.
//!
//! A [`Change`] is the effect of one operation on one grid snapshot. It stores
//! only what differs: an optional column layout swap plus row hunks, each
//! replacing a run of old rows with a run of new rows. Rows outside the hunks
//! are shared between the two grids.

use std::ops::Range;
use std::sync::Arc;

use crate::error::{HistoryError, HistoryResult};
use crate::models::{Column, Grid, Row};

/// Replace `old_rows` starting at `start` with `new_rows`.
#[derive(Debug, Clone, PartialEq)]
pub struct RowHunk {
    /// Index of the first replaced row in the grid the change applies to.
    pub start: usize,
    pub old_rows: Vec<Arc<Row>>,
    pub new_rows: Vec<Arc<Row>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    pub before: Vec<Column>,
    pub after: Vec<Column>,
}

/// Row-level diff between two grids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Change {
    columns: Option<ColumnLayout>,
    /// Sorted by `start`, non-overlapping.
    hunks: Vec<RowHunk>,
}

/// Summary of a change, for logs and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeStats {
    pub hunks: usize,
    pub rows_removed: usize,
    pub rows_inserted: usize,
}

impl Change {
    pub fn columns(&self) -> Option<&ColumnLayout> {
        self.columns.as_ref()
    }

    pub fn hunks(&self) -> &[RowHunk] {
        &self.hunks
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_none() && self.hunks.is_empty()
    }

    /// Net change in row count.
    pub fn row_delta(&self) -> isize {
        self.hunks
            .iter()
            .map(|h| h.new_rows.len() as isize - h.old_rows.len() as isize)
            .sum()
    }

    pub fn stats(&self) -> ChangeStats {
        ChangeStats {
            hunks: self.hunks.len(),
            rows_removed: self.hunks.iter().map(|h| h.old_rows.len()).sum(),
            rows_inserted: self.hunks.iter().map(|h| h.new_rows.len()).sum(),
        }
    }

    /// Apply this change to the grid it was computed against.
    ///
    /// Fails with [`HistoryError::StaleChange`] when the grid does not contain
    /// the rows or columns the change expects to replace.
    pub fn apply(&self, grid: &Grid) -> HistoryResult<Grid> {
        let columns = match &self.columns {
            Some(layout) => {
                if grid.columns() != layout.before.as_slice() {
                    return Err(HistoryError::StaleChange(
                        "column layout differs from the one the change was computed against"
                            .to_string(),
                    ));
                }
                layout.after.clone()
            }
            None => grid.columns().to_vec(),
        };

        let old = grid.rows();
        let capacity = (old.len() as isize + self.row_delta()).max(0) as usize;
        let mut rows: Vec<Arc<Row>> = Vec::with_capacity(capacity);
        let mut cursor = 0;

        for hunk in &self.hunks {
            let end = hunk.start + hunk.old_rows.len();
            if hunk.start < cursor || end > old.len() {
                return Err(HistoryError::StaleChange(format!(
                    "rows {}..{} are out of range for a grid of {} rows",
                    hunk.start,
                    end,
                    old.len()
                )));
            }
            let matches = old[hunk.start..end]
                .iter()
                .zip(&hunk.old_rows)
                .all(|(current, expected)| Arc::ptr_eq(current, expected) || current == expected);
            if !matches {
                return Err(HistoryError::StaleChange(format!(
                    "rows {}..{} were modified since the change was computed",
                    hunk.start, end
                )));
            }
            rows.extend_from_slice(&old[cursor..hunk.start]);
            rows.extend(hunk.new_rows.iter().cloned());
            cursor = end;
        }
        rows.extend_from_slice(&old[cursor..]);

        Grid::from_shared(columns, rows).map_err(|e| HistoryError::StaleChange(e.to_string()))
    }

    /// Undo this change on the grid it produced.
    pub fn revert(&self, grid: &Grid) -> HistoryResult<Grid> {
        self.inverse().apply(grid)
    }

    /// The change that takes the resulting grid back to the original one.
    pub fn inverse(&self) -> Change {
        let mut offset: isize = 0;
        let hunks = self
            .hunks
            .iter()
            .map(|hunk| {
                let start = (hunk.start as isize + offset) as usize;
                offset += hunk.new_rows.len() as isize - hunk.old_rows.len() as isize;
                RowHunk {
                    start,
                    old_rows: hunk.new_rows.clone(),
                    new_rows: hunk.old_rows.clone(),
                }
            })
            .collect();

        Change {
            columns: self.columns.as_ref().map(|layout| ColumnLayout {
                before: layout.after.clone(),
                after: layout.before.clone(),
            }),
            hunks,
        }
    }
}

/// Accumulates hunks while an operation walks a grid top to bottom.
pub struct ChangeBuilder<'a> {
    grid: &'a Grid,
    columns: Option<ColumnLayout>,
    hunks: Vec<RowHunk>,
}

impl<'a> ChangeBuilder<'a> {
    pub fn new(grid: &'a Grid) -> Self {
        Self {
            grid,
            columns: None,
            hunks: Vec::new(),
        }
    }

    /// Record a new column layout; every row must then be replaced as well.
    pub fn set_columns(&mut self, after: Vec<Column>) -> &mut Self {
        self.columns = Some(ColumnLayout {
            before: self.grid.columns().to_vec(),
            after,
        });
        self
    }

    /// Replace the rows in `range` with `new_rows`. Ranges must be given in
    /// increasing order; touching ranges are merged into one hunk.
    pub fn replace(&mut self, range: Range<usize>, new_rows: Vec<Row>) -> &mut Self {
        let old_rows = &self.grid.rows()[range.clone()];
        let new_rows = new_rows.into_iter().map(Arc::new);

        match self.hunks.last_mut() {
            Some(last) if last.start + last.old_rows.len() == range.start => {
                last.old_rows.extend(old_rows.iter().cloned());
                last.new_rows.extend(new_rows);
            }
            _ => self.hunks.push(RowHunk {
                start: range.start,
                old_rows: old_rows.to_vec(),
                new_rows: new_rows.collect(),
            }),
        }
        self
    }

    pub fn build(self) -> Change {
        Change {
            columns: self.columns,
            hunks: self.hunks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;

    fn grid() -> Grid {
        Grid::from_values(&["a"], vec![vec!["r0"], vec!["r1"], vec!["r2"], vec!["r3"]]).unwrap()
    }

    fn row(s: &str) -> Row {
        Row::new(vec![Cell::string(s)])
    }

    #[test]
    fn test_apply_and_revert() {
        let g = grid();
        let mut builder = ChangeBuilder::new(&g);
        builder
            .replace(0..1, vec![row("x"), row("y")])
            .replace(2..3, vec![]);
        let change = builder.build();

        let applied = change.apply(&g).unwrap();
        let values: Vec<_> = applied.rows().iter().map(|r| r.cell(0).clone()).collect();
        assert_eq!(
            values,
            vec![Cell::string("x"), Cell::string("y"), Cell::string("r1"), Cell::string("r3")]
        );
        assert_eq!(change.row_delta(), 0);

        assert_eq!(change.revert(&applied).unwrap(), g);
    }

    #[test]
    fn test_untouched_rows_are_shared() {
        let g = grid();
        let mut builder = ChangeBuilder::new(&g);
        builder.replace(1..2, vec![row("z")]);
        let applied = builder.build().apply(&g).unwrap();
        assert!(Arc::ptr_eq(&g.rows()[0], &applied.rows()[0]));
        assert!(Arc::ptr_eq(&g.rows()[3], &applied.rows()[3]));
    }

    #[test]
    fn test_adjacent_ranges_merge() {
        let g = grid();
        let mut builder = ChangeBuilder::new(&g);
        builder.replace(0..1, vec![row("x")]).replace(1..2, vec![row("y")]);
        let change = builder.build();
        assert_eq!(change.stats(), ChangeStats { hunks: 1, rows_removed: 2, rows_inserted: 2 });
    }

    #[test]
    fn test_stale_change_is_rejected() {
        let g = grid();
        let mut builder = ChangeBuilder::new(&g);
        builder.replace(3..4, vec![]);
        let change = builder.build();

        let shorter = Grid::from_values(&["a"], vec![vec!["r0"]]).unwrap();
        assert!(matches!(change.apply(&shorter), Err(HistoryError::StaleChange(_))));

        let edited = Grid::from_values(&["a"], vec![vec!["r0"], vec!["r1"], vec!["r2"], vec!["other"]])
            .unwrap();
        assert!(matches!(change.apply(&edited), Err(HistoryError::StaleChange(_))));
    }
}
