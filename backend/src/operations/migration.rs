//! Legacy operation JSON shapes.
//!
//! Older documents spelled some fields differently. Each [`LegacyShape`]
//! recognises one such spelling and rewrites it into the canonical form, so
//! operation types only ever deserialize a single shape. Serialization always
//! emits the canonical form.

use serde_json::{Map, Value};

use super::cell::split::SPLIT_OP_ID;

type Doc = Map<String, Value>;

/// One recognised legacy spelling of an operation document.
pub struct LegacyShape {
    /// Operation identifier this shape applies to.
    pub op: &'static str,
    pub name: &'static str,
    pub detect: fn(&Doc) -> bool,
    pub upgrade: fn(&mut Doc),
}

/// All known legacy shapes, applied in order.
pub static LEGACY_SHAPES: &[LegacyShape] = &[
    LegacyShape {
        op: SPLIT_OP_ID,
        name: "plain-mode",
        detect: |doc| mode(doc) == Some("plain"),
        upgrade: |doc| to_separator_mode(doc, false),
    },
    LegacyShape {
        op: SPLIT_OP_ID,
        name: "regex-mode",
        detect: |doc| mode(doc) == Some("regex"),
        upgrade: |doc| to_separator_mode(doc, true),
    },
    LegacyShape {
        op: SPLIT_OP_ID,
        name: "implicit-lengths-mode",
        detect: |doc| !has_known_mode(doc) && doc.contains_key("fieldLengths"),
        upgrade: |doc| {
            doc.insert("mode".to_string(), Value::from("lengths"));
        },
    },
    LegacyShape {
        op: SPLIT_OP_ID,
        name: "implicit-separator-mode",
        detect: |doc| !has_known_mode(doc) && doc.contains_key("separator"),
        upgrade: |doc| to_separator_mode(doc, false),
    },
    LegacyShape {
        op: SPLIT_OP_ID,
        name: "missing-regex-flag",
        detect: |doc| mode(doc) == Some("separator") && !doc.contains_key("regex"),
        upgrade: |doc| {
            doc.insert("regex".to_string(), Value::Bool(false));
        },
    },
];

/// Rewrite `doc` into the canonical shape for `op`.
///
/// Returns the names of the shapes that were applied.
pub fn upgrade(op: &str, doc: &mut Doc) -> Vec<&'static str> {
    let mut applied = Vec::new();
    for shape in LEGACY_SHAPES.iter().filter(|s| s.op == op) {
        if (shape.detect)(doc) {
            (shape.upgrade)(doc);
            applied.push(shape.name);
        }
    }
    applied
}

fn mode(doc: &Doc) -> Option<&str> {
    doc.get("mode").and_then(Value::as_str)
}

fn has_known_mode(doc: &Doc) -> bool {
    matches!(mode(doc), Some("separator" | "lengths"))
}

/// An explicit `regex` flag wins over the one implied by the legacy mode.
fn to_separator_mode(doc: &mut Doc, implied_regex: bool) {
    doc.insert("mode".to_string(), Value::from("separator"));
    if !matches!(doc.get("regex"), Some(Value::Bool(_))) {
        doc.insert("regex".to_string(), Value::Bool(implied_regex));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn upgraded(value: Value) -> (Value, Vec<&'static str>) {
        let mut doc = value.as_object().cloned().unwrap();
        let applied = upgrade(SPLIT_OP_ID, &mut doc);
        (Value::Object(doc), applied)
    }

    #[test]
    fn test_plain_mode() {
        let (doc, applied) = upgraded(json!({"mode": "plain", "separator": "||"}));
        assert_eq!(doc, json!({"mode": "separator", "separator": "||", "regex": false}));
        assert_eq!(applied, vec!["plain-mode"]);
    }

    #[test]
    fn test_regex_mode() {
        let (doc, _) = upgraded(json!({"mode": "regex", "separator": "[a-z]"}));
        assert_eq!(doc, json!({"mode": "separator", "separator": "[a-z]", "regex": true}));
    }

    #[test]
    fn test_missing_mode_defaults_to_plain_separator() {
        let (doc, _) = upgraded(json!({"separator": ","}));
        assert_eq!(doc, json!({"mode": "separator", "separator": ",", "regex": false}));

        let (doc, _) = upgraded(json!({"mode": "bogus", "separator": ","}));
        assert_eq!(doc["mode"], "separator");
    }

    #[test]
    fn test_canonical_documents_are_untouched() {
        let canonical = json!({"mode": "separator", "separator": ":", "regex": true});
        let (doc, applied) = upgraded(canonical.clone());
        assert_eq!(doc, canonical);
        assert!(applied.is_empty());

        let lengths = json!({"mode": "lengths", "fieldLengths": [1, 2]});
        assert_eq!(upgraded(lengths.clone()).0, lengths);
    }

    #[test]
    fn test_other_operations_are_untouched() {
        let mut doc = json!({"mode": "plain"}).as_object().cloned().unwrap();
        assert!(upgrade("core/column-removal", &mut doc).is_empty());
        assert_eq!(doc["mode"], "plain");
    }
}
