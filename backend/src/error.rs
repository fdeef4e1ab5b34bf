//! Error types for the Tabula operation engine.
//!
//! One enum per layer, from the bottom up:
//!
//! - [`GridError`] - grid construction and grid file errors
//! - [`OperationError`] - operation validation, registry and execution errors
//! - [`HistoryError`] - change application, undo/redo and replay errors
//! - [`ConfigError`] - engine configuration errors
//! - [`ParseError`] - errors reported by the expression evaluator collaborator
//! - [`EngineError`] - top-level error wrapping all of the above
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries. Anything that leaves the
//! engine is turned into an [`ErrorReport`], whose `kind` is stable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Grid Errors
// =============================================================================

/// Errors raised while building or loading a grid.
#[derive(Debug, Error)]
pub enum GridError {
    /// Two columns share a name.
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    /// A row does not have exactly one cell per column.
    #[error("Row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Failed to read or write a grid file.
    #[error("Grid IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed grid document.
    #[error("Grid JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Operation Errors
// =============================================================================

/// Errors raised by operations and the operation registry.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Operation configuration is missing or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No deserializer is registered under this identifier.
    #[error("Unknown operation type: {0}")]
    UnknownOperationType(String),

    /// The operation refers to a column the grid does not have.
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// The operation produced a grid violating the grid invariants.
    #[error("Invalid grid: {0}")]
    Grid(#[from] GridError),

    /// JSON serialization/deserialization error.
    #[error("Operation JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OperationError {
    /// Shorthand for [`OperationError::InvalidArgument`].
    pub fn invalid(message: impl Into<String>) -> Self {
        OperationError::InvalidArgument(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OperationError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            OperationError::UnknownOperationType(_) => ErrorKind::UnknownOperationType,
            OperationError::ColumnNotFound(_) => ErrorKind::ColumnNotFound,
            OperationError::Grid(_) => ErrorKind::InvalidGrid,
            // A document that does not fit the operation's schema is a bad argument
            OperationError::Json(_) => ErrorKind::InvalidArgument,
        }
    }
}

// =============================================================================
// History Errors
// =============================================================================

/// Errors raised by the change/history engine.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The history cursor is already at the start.
    #[error("Nothing to undo")]
    NothingToUndo,

    /// The history cursor is already at the tail.
    #[error("Nothing to redo")]
    NothingToRedo,

    /// A change was applied to a grid it was not computed against.
    #[error("Change does not fit the current grid: {0}")]
    StaleChange(String),

    /// The operation could not be applied.
    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),

    /// Replaying a persisted operation list stopped at an entry.
    #[error("Replay failed at operation {index}: {source}")]
    Replay {
        index: usize,
        #[source]
        source: OperationError,
    },
}

impl HistoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HistoryError::NothingToUndo => ErrorKind::NothingToUndo,
            HistoryError::NothingToRedo => ErrorKind::NothingToRedo,
            HistoryError::StaleChange(_) => ErrorKind::StaleChange,
            HistoryError::Operation(e) => e.kind(),
            HistoryError::Replay { source, .. } => source.kind(),
        }
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors in engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration value could not be parsed.
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

// =============================================================================
// Expression Parse Errors
// =============================================================================

/// Parse failure reported by the expression evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Parsing error at offset {offset}: {message}")]
pub struct ParseError {
    /// Character offset into the expression where parsing failed.
    pub offset: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

// =============================================================================
// Engine Errors (top-level)
// =============================================================================

/// Top-level engine error.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Grid error.
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    /// Operation error.
    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),

    /// History error.
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Expression parse error.
    #[error("{0}")]
    Parse(#[from] ParseError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Grid(_) => ErrorKind::InvalidGrid,
            EngineError::Operation(e) => e.kind(),
            EngineError::History(e) => e.kind(),
            EngineError::Config(_) => ErrorKind::InvalidArgument,
            EngineError::Parse(_) => ErrorKind::Parser,
        }
    }

    /// Structured, serializable form of this error.
    pub fn report(&self) -> ErrorReport {
        let offset = match self {
            EngineError::Parse(e) => Some(e.offset),
            _ => None,
        };
        ErrorReport {
            code: "error".to_string(),
            kind: self.kind(),
            message: self.to_string(),
            offset,
        }
    }
}

// =============================================================================
// Structured Error Reports
// =============================================================================

/// Stable error classification callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    UnknownOperationType,
    ColumnNotFound,
    InvalidGrid,
    Parser,
    StaleChange,
    NothingToUndo,
    NothingToRedo,
}

/// Error as it crosses the engine boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Always `"error"`.
    pub code: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

macro_rules! impl_report_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ErrorReport {
                fn from(err: $ty) -> Self {
                    EngineError::from(err).report()
                }
            }
        )*
    };
}

impl_report_from!(GridError, OperationError, HistoryError, ConfigError, ParseError);

impl From<EngineError> for ErrorReport {
    fn from(err: EngineError) -> Self {
        err.report()
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for grid construction.
pub type GridResult<T> = Result<T, GridError>;

/// Result type for operations.
pub type OperationResult<T> = Result<T, OperationError>;

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Result type for engine-level calls.
pub type EngineResult<T> = Result<T, EngineError>;
