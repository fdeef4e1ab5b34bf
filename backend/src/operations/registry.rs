//! Operation Registry - Resolve persisted operations by identifier
//!
//! Maps `module/operation-name` identifiers to deserializers. The registry is
//! filled once at startup and only read afterwards; [`OPERATION_REGISTRY`]
//! holds the core operations.

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

use super::cell::{MultiValuedCellJoinOperation, MultiValuedCellSplitOperation, JOIN_OP_ID, SPLIT_OP_ID};
use super::column::{ColumnRemovalOperation, COLUMN_REMOVAL_OP_ID};
use super::{migration, Operation};
use crate::error::{OperationError, OperationResult};

/// Builds an operation from its canonical JSON document.
pub type OperationDeserializer = fn(Value) -> OperationResult<Box<dyn Operation>>;

/// Registry of every operation type the engine can load.
pub static OPERATION_REGISTRY: Lazy<OperationRegistry> = Lazy::new(OperationRegistry::with_core);

/// Identifier → deserializer map
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    deserializers: HashMap<String, OperationDeserializer>,
}

impl OperationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the core operations
    pub fn with_core() -> Self {
        let mut registry = Self::new();
        registry.register_id(SPLIT_OP_ID, deserialize_as::<MultiValuedCellSplitOperation>);
        registry.register_id(JOIN_OP_ID, deserialize_as::<MultiValuedCellJoinOperation>);
        registry.register_id(COLUMN_REMOVAL_OP_ID, deserialize_as::<ColumnRemovalOperation>);
        registry
    }

    /// Register `module/name`. A later registration under the same identifier wins.
    pub fn register(&mut self, module: &str, name: &str, deserializer: OperationDeserializer) {
        self.register_id(&format!("{}/{}", module, name), deserializer);
    }

    fn register_id(&mut self, id: &str, deserializer: OperationDeserializer) {
        if self.deserializers.insert(id.to_string(), deserializer).is_some() {
            tracing::debug!(op = id, "operation deserializer replaced");
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.deserializers.contains_key(id)
    }

    /// All registered identifiers, sorted
    pub fn registered_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.deserializers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Build an operation from a JSON document, upgrading legacy shapes first.
    pub fn deserialize(&self, doc: &Value) -> OperationResult<Box<dyn Operation>> {
        let mut obj = doc
            .as_object()
            .cloned()
            .ok_or_else(|| OperationError::invalid("operation must be a JSON object"))?;

        let op = obj
            .get("op")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| OperationError::invalid("operation is missing its \"op\" field"))?;

        let deserializer = self.deserializers.get(&op).ok_or_else(|| {
            tracing::warn!(op = %op, "unknown operation type");
            OperationError::UnknownOperationType(op.clone())
        })?;

        let applied = migration::upgrade(&op, &mut obj);
        if !applied.is_empty() {
            tracing::debug!(op = %op, shapes = ?applied, "upgraded legacy operation document");
        }

        deserializer(Value::Object(obj))
    }

    pub fn deserialize_str(&self, json: &str) -> OperationResult<Box<dyn Operation>> {
        let doc: Value = serde_json::from_str(json)?;
        self.deserialize(&doc)
    }
}

/// Deserializer for any serde-backed operation type.
pub fn deserialize_as<T>(doc: Value) -> OperationResult<Box<dyn Operation>>
where
    T: Operation + DeserializeOwned + 'static,
{
    let op: T = serde_json::from_value(doc)?;
    Ok(Box::new(op))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_core_operations_registered() {
        let registry = OperationRegistry::with_core();
        assert_eq!(
            registry.registered_ids(),
            vec![COLUMN_REMOVAL_OP_ID, JOIN_OP_ID, SPLIT_OP_ID]
        );
        assert!(OPERATION_REGISTRY.contains(SPLIT_OP_ID));
    }

    #[test]
    fn test_unknown_operation_type() {
        let err = OPERATION_REGISTRY
            .deserialize(&json!({"op": "core/does-not-exist"}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownOperationType);
    }

    #[test]
    fn test_missing_op_field() {
        let err = OPERATION_REGISTRY
            .deserialize(&json!({"columnName": "a"}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = OPERATION_REGISTRY.deserialize(&json!([1, 2])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_register_custom_module() {
        let mut registry = OperationRegistry::new();
        registry.register("extra", "drop", deserialize_as::<ColumnRemovalOperation>);
        assert!(registry.contains("extra/drop"));

        let op = registry
            .deserialize_str(r#"{"op": "extra/drop", "columnName": "a"}"#)
            .unwrap();
        assert_eq!(op.column_dependencies().unwrap().len(), 1);
    }

    #[test]
    fn test_schema_mismatch_is_invalid_argument() {
        let err = OPERATION_REGISTRY
            .deserialize(&json!({"op": SPLIT_OP_ID, "mode": "lengths", "fieldLengths": "x"}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
