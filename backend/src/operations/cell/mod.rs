//! Operations that rewrite cell values within one column.

pub mod join;
pub mod split;

pub use join::{MultiValuedCellJoinOperation, JOIN_OP_ID};
pub use split::{MultiValuedCellSplitOperation, SplitMode, SPLIT_OP_ID};
