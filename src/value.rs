//! Value classification and canonical stringification.
//!
//! Failure payloads carry `actual`/`expected` as `serde_json::Value`. Two
//! values are comparable for diffing only when they classify identically;
//! non-string pairs are canonicalized (object keys sorted recursively) and
//! pretty-printed so that structurally equal values serialize identically.
//! `serde_json::Value` cannot contain reference cycles, so recursion is
//! bounded by the input itself.

use serde_json::{Map, Value};

/// Deterministic, total classification of a payload value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

pub fn classify(value: &Value) -> TypeTag {
    match value {
        Value::Null => TypeTag::Null,
        Value::Bool(_) => TypeTag::Bool,
        Value::Number(_) => TypeTag::Number,
        Value::String(_) => TypeTag::String,
        Value::Array(_) => TypeTag::Array,
        Value::Object(_) => TypeTag::Object,
    }
}

pub fn same_type(a: &Value, b: &Value) -> bool {
    classify(a) == classify(b)
}

/// Rebuilds a value with every object's keys in lexicographic order, at all
/// depths. Arrays keep their element order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(fields) => {
            let mut keys: Vec<&String> = fields.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&fields[key]));
            }
            Value::Object(sorted)
        }
        other => other.clone(),
    }
}

/// Canonical, human-readable serialization. Structurally equal values
/// stringify identically regardless of original key order.
pub fn stringify(value: &Value) -> String {
    let canonical = canonicalize(value);
    serde_json::to_string_pretty(&canonical).unwrap_or_else(|_| canonical.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classification_is_total_over_json() {
        assert_eq!(classify(&json!(null)), TypeTag::Null);
        assert_eq!(classify(&json!(true)), TypeTag::Bool);
        assert_eq!(classify(&json!(1.5)), TypeTag::Number);
        assert_eq!(classify(&json!("s")), TypeTag::String);
        assert_eq!(classify(&json!([1])), TypeTag::Array);
        assert_eq!(classify(&json!({"a": 1})), TypeTag::Object);
    }

    #[test]
    fn same_type_requires_matching_tags() {
        assert!(same_type(&json!({"a": 1}), &json!({"b": 2})));
        assert!(!same_type(&json!({"a": 1}), &json!([1])));
        assert!(!same_type(&json!("1"), &json!(1)));
    }

    #[test]
    fn stringify_is_key_order_independent() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert_eq!(stringify(&a), stringify(&b));
    }

    #[test]
    fn stringify_sorts_nested_objects_too() {
        let a = json!({"outer": {"z": 1, "a": 2}, "list": [{"y": 0, "x": 1}]});
        let b = json!({"list": [{"x": 1, "y": 0}], "outer": {"a": 2, "z": 1}});
        assert_eq!(stringify(&a), stringify(&b));
    }

    #[test]
    fn arrays_keep_element_order() {
        assert_ne!(stringify(&json!([1, 2])), stringify(&json!([2, 1])));
    }
}
