//! # Tabula - operation engine for tabular data
//!
//! Tabula applies serializable operations to an immutable grid, keeping a
//! reversible change per operation so every step can be undone and redone.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Operation  │────▶│  Registry   │────▶│  Operation  │────▶│   Change    │
//! │    JSON     │     │ (+ legacy)  │     │ (validated) │     │ (row hunks) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                                                    │
//!                                         ┌─────────────┐            ▼
//!                                         │   Project   │◀──── apply / undo
//!                                         │ grid+history│
//!                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabula::{EngineConfig, Grid, Project, OPERATION_REGISTRY};
//!
//! let grid = Grid::from_json_file("grid.json".as_ref())?;
//! let project = Project::new(grid, EngineConfig::from_env()?);
//! project.apply_json(&serde_json::json!({
//!     "op": "core/multivalued-cell-split",
//!     "columnName": "Value",
//!     "keyColumnName": "Key",
//!     "mode": "separator",
//!     "separator": ":",
//!     "regex": false
//! }), &OPERATION_REGISTRY)?;
//! project.undo()?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types and structured reports
//! - [`models`] - Cells, rows, columns and grids
//! - [`operations`] - Operation contract, registry, legacy migration and core operations
//! - [`history`] - Changes, history cursor, projects and events
//! - [`expr`] - Expression evaluator boundary
//! - [`config`] - Engine configuration

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Operations
pub mod operations;

// Change/history engine
pub mod history;

// Expressions
pub mod expr;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, EngineError, EngineResult, ErrorKind, ErrorReport, GridError, HistoryError,
    OperationError, ParseError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, Column, Grid, RecordSpan, Row};

// =============================================================================
// Re-exports - Operations
// =============================================================================

pub use operations::cell::{
    MultiValuedCellJoinOperation, MultiValuedCellSplitOperation, SplitMode,
};
pub use operations::column::ColumnRemovalOperation;
pub use operations::registry::{OperationRegistry, OPERATION_REGISTRY};
pub use operations::{ColumnRenames, ColumnsDiff, Operation};

// =============================================================================
// Re-exports - History
// =============================================================================

pub use history::change::{Change, ChangeStats};
pub use history::events::{HistoryAction, HistoryEvent};
pub use history::{History, HistoryEntry, Project, Transition};

// =============================================================================
// Re-exports - Expressions and configuration
// =============================================================================

pub use config::EngineConfig;
pub use expr::{preview_expression, Evaluator, PreviewResponse, RowContext};
