//! Change/history engine.
//!
//! This module provides:
//! - [`apply`], [`undo`], [`redo`]: pure functions over grid snapshots
//! - [`History`]: linear list of applied entries with an undo cursor
//! - `change`: reversible row-level diffs
//! - `project`: grid + history behind an execution lock
//! - `events`: broadcast of history transitions
//!
//! ## Example
//!
//! ```rust,ignore
//! use tabula::history::{apply, undo};
//!
//! let (next, change) = apply(op.as_ref(), &grid, &config)?;
//! assert_eq!(undo(&change, &next)?, grid);
//! ```

pub mod change;
pub mod events;
pub mod project;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{HistoryError, HistoryResult, OperationError, OperationResult};
use crate::models::Grid;
use crate::operations::Operation;
use change::Change;

pub use project::{Project, Transition};

// =============================================================================
// Pure apply / undo / redo
// =============================================================================

/// Run `op` against `grid`, returning the new grid and the change that
/// produced it. `grid` itself is never modified.
pub fn apply(
    op: &dyn Operation,
    grid: &Grid,
    config: &EngineConfig,
) -> HistoryResult<(Grid, Change)> {
    op.validate()?;
    check_dependencies(op, grid)?;

    let change = op.create_change(grid, config)?;
    let next = change.apply(grid)?;

    let stats = change.stats();
    tracing::debug!(
        op = op.op_id(),
        hunks = stats.hunks,
        rows_removed = stats.rows_removed,
        rows_inserted = stats.rows_inserted,
        "computed change"
    );
    Ok((next, change))
}

/// Take the grid produced by `change` back to the grid it was computed on.
pub fn undo(change: &Change, grid: &Grid) -> HistoryResult<Grid> {
    change.revert(grid)
}

/// Re-apply `change` to the grid it was computed on.
pub fn redo(change: &Change, grid: &Grid) -> HistoryResult<Grid> {
    change.apply(grid)
}

fn check_dependencies(op: &dyn Operation, grid: &Grid) -> OperationResult<()> {
    if let Some(columns) = op.column_dependencies() {
        if let Some(missing) = columns.iter().find(|c| grid.column_index(c).is_none()) {
            return Err(OperationError::ColumnNotFound(missing.clone()));
        }
    }
    Ok(())
}

// =============================================================================
// History
// =============================================================================

/// One applied operation and its effect
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub operation: Box<dyn Operation>,
    pub change: Change,
    pub applied_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(operation: Box<dyn Operation>, change: Change) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            change,
            applied_at: Utc::now(),
        }
    }
}

/// Linear history. Entries before `cursor` are applied; entries from
/// `cursor` on can be redone until the next push discards them.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    limit: Option<usize>,
}

impl History {
    /// A limit of `Some(0)` keeps everything, like `None`.
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            limit: limit.filter(|&l| l > 0),
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// Entries that are currently applied, oldest first.
    pub fn applied(&self) -> &[HistoryEntry] {
        &self.entries[..self.cursor]
    }

    /// Commit a new entry, dropping the redo tail.
    pub fn push(&mut self, entry: HistoryEntry) -> &HistoryEntry {
        let discarded = self.entries.len() - self.cursor;
        if discarded > 0 {
            tracing::debug!(discarded, "dropping redo tail");
            self.entries.truncate(self.cursor);
        }
        self.entries.push(entry);
        self.cursor = self.entries.len();

        if let Some(limit) = self.limit {
            if self.entries.len() > limit {
                let evicted = self.entries.len() - limit;
                self.entries.drain(..evicted);
                self.cursor -= evicted;
                tracing::debug!(evicted, limit, "evicted oldest history entries");
            }
        }

        &self.entries[self.cursor - 1]
    }

    /// Revert the last applied entry on `grid`. The cursor only moves when
    /// the revert succeeds.
    pub fn undo(&mut self, grid: &Grid) -> HistoryResult<(Grid, &HistoryEntry)> {
        if !self.can_undo() {
            return Err(HistoryError::NothingToUndo);
        }
        let previous = undo(&self.entries[self.cursor - 1].change, grid)?;
        self.cursor -= 1;
        Ok((previous, &self.entries[self.cursor]))
    }

    /// Re-apply the first undone entry on `grid`.
    pub fn redo(&mut self, grid: &Grid) -> HistoryResult<(Grid, &HistoryEntry)> {
        if !self.can_redo() {
            return Err(HistoryError::NothingToRedo);
        }
        let next = redo(&self.entries[self.cursor].change, grid)?;
        self.cursor += 1;
        Ok((next, &self.entries[self.cursor - 1]))
    }

    /// Applied operations in canonical JSON, suitable for replay.
    pub fn operations_json(&self) -> OperationResult<Vec<Value>> {
        self.applied()
            .iter()
            .map(|entry| entry.operation.to_json())
            .collect()
    }
}
