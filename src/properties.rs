//! Property bag helpers.
//!
//! Every lifecycle call carries its resource properties as a
//! `google.protobuf.Struct`. This module converts those structs to and from
//! [`serde_json::Value`] and provides the null-tolerant path navigation and
//! structural equality the diff engine is built on.

use prost_types::value::Kind as ProtoKind;
use serde_json::{Map, Number, Value};

/// A resource's fields as a JSON object.
pub type PropertyBag = Value;

/// Placeholder the engine sends during preview for values not yet known.
pub const UNKNOWN_SENTINEL: &str = "04da6b54-80e4-46f7-96ec-b56ff0331ba9";

/// Resolve `path` inside `bag`.
///
/// Missing keys, non-object intermediates and explicit `null` all resolve to
/// `None`, so callers never have to distinguish "absent" from "null".
pub fn get_path<'a>(bag: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = bag;
    for segment in path {
        current = current.as_object()?.get(*segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Structural equality of two optional property values.
///
/// Object key order is irrelevant, keys holding `null` are treated as absent
/// and numbers compare by value (`1` equals `1.0`). Arrays compare in order.
pub fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (normalize(a), normalize(b)) {
        (None, None) => true,
        (Some(a), Some(b)) => value_eq(a, b),
        _ => false,
    }
}

fn normalize(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| value_eq(l, r))
        }
        (Value::Object(x), Value::Object(y)) => x
            .keys()
            .chain(y.keys())
            .all(|key| values_equal(x.get(key), y.get(key))),
        _ => a == b,
    }
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    if let (Some(l), Some(r)) = (x.as_i64(), y.as_i64()) {
        return l == r;
    }
    if let (Some(l), Some(r)) = (x.as_u64(), y.as_u64()) {
        return l == r;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => false,
    }
}

/// Whether `value` is the engine's preview placeholder.
pub fn is_unknown(value: &Value) -> bool {
    value.as_str() == Some(UNKNOWN_SENTINEL)
}

/// Whether any top-level property of `bag` is still unknown.
pub fn contains_unknowns(bag: &Value) -> bool {
    match bag {
        Value::Object(map) => map.values().any(contains_unknowns),
        Value::Array(items) => items.iter().any(contains_unknowns),
        other => is_unknown(other),
    }
}

/// Render a property value as the string form used in ids and URL paths.
///
/// Integral numbers render without a fractional part.
pub fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.to_string(),
        }),
        _ => None,
    }
}

/// Set `path` inside `bag` to `value` unless something is already there.
///
/// Intermediate objects are created as needed. Non-object intermediates are
/// left untouched.
pub fn set_path_if_absent(bag: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = bag;
    for segment in parents {
        let Some(map) = current.as_object_mut() else {
            return;
        };
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if let Some(map) = current.as_object_mut() {
        let slot = map.entry(last.to_string()).or_insert(Value::Null);
        if slot.is_null() {
            *slot = value;
        }
    }
}

/// Convert a protobuf struct into a JSON object.
pub fn struct_to_value(proto: Option<prost_types::Struct>) -> Value {
    match proto {
        Some(s) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, proto_to_value(v)))
                .collect(),
        ),
        None => Value::Object(Map::new()),
    }
}

fn proto_to_value(proto: prost_types::Value) -> Value {
    match proto.kind {
        None | Some(ProtoKind::NullValue(_)) => Value::Null,
        Some(ProtoKind::BoolValue(b)) => Value::Bool(b),
        Some(ProtoKind::StringValue(s)) => Value::String(s),
        Some(ProtoKind::NumberValue(n)) => number_to_value(n),
        Some(ProtoKind::ListValue(list)) => {
            Value::Array(list.values.into_iter().map(proto_to_value).collect())
        }
        Some(ProtoKind::StructValue(s)) => struct_to_value(Some(s)),
    }
}

fn number_to_value(n: f64) -> Value {
    // Struct only carries doubles; ids from the engine must compare equal to
    // the integer ids the REST API returns.
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Convert a JSON object into a protobuf struct.
///
/// Non-object values produce an empty struct.
pub fn value_to_struct(value: &Value) -> prost_types::Struct {
    match value {
        Value::Object(map) => prost_types::Struct {
            fields: map
                .iter()
                .map(|(k, v)| (k.clone(), value_to_proto(v)))
                .collect(),
        },
        _ => prost_types::Struct::default(),
    }
}

fn value_to_proto(value: &Value) -> prost_types::Value {
    let kind = match value {
        Value::Null => ProtoKind::NullValue(0),
        Value::Bool(b) => ProtoKind::BoolValue(*b),
        Value::Number(n) => ProtoKind::NumberValue(n.as_f64().unwrap_or_default()),
        Value::String(s) => ProtoKind::StringValue(s.clone()),
        Value::Array(items) => ProtoKind::ListValue(prost_types::ListValue {
            values: items.iter().map(value_to_proto).collect(),
        }),
        Value::Object(_) => ProtoKind::StructValue(value_to_struct(value)),
    };
    prost_types::Value { kind: Some(kind) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_path_nested() {
        let bag = json!({"project": {"name": "demo"}, "id": 3});
        assert_eq!(get_path(&bag, &["project", "name"]), Some(&json!("demo")));
        assert_eq!(get_path(&bag, &["id"]), Some(&json!(3)));
    }

    #[test]
    fn test_get_path_missing_resolves_to_none() {
        let bag = json!({"project": {"name": "demo"}, "pipeline": null, "id": 3});
        assert!(get_path(&bag, &["missing"]).is_none());
        assert!(get_path(&bag, &["pipeline", "id"]).is_none());
        assert!(get_path(&bag, &["id", "nested"]).is_none());
        assert!(get_path(&bag, &["pipeline"]).is_none());
        assert!(get_path(&Value::Null, &["anything"]).is_none());
    }

    #[test]
    fn test_values_equal_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"name":"a","meta":{"x":1,"y":2}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"meta":{"y":2,"x":1},"name":"a"}"#).unwrap();
        assert!(values_equal(Some(&a), Some(&b)));
    }

    #[test]
    fn test_values_equal_numbers_and_nulls() {
        assert!(values_equal(Some(&json!(1)), Some(&json!(1.0))));
        assert!(!values_equal(Some(&json!(1)), Some(&json!(2))));
        assert!(values_equal(None, Some(&Value::Null)));
        assert!(values_equal(
            Some(&json!({"a": 1, "b": null})),
            Some(&json!({"a": 1}))
        ));
        assert!(!values_equal(None, Some(&json!(""))));
    }

    #[test]
    fn test_values_equal_arrays_are_ordered() {
        assert!(values_equal(Some(&json!(["a", "b"])), Some(&json!(["a", "b"]))));
        assert!(!values_equal(Some(&json!(["a", "b"])), Some(&json!(["b", "a"]))));
        assert!(!values_equal(Some(&json!(["a"])), Some(&json!(["a", "b"]))));
    }

    #[test]
    fn test_struct_conversion_normalizes_integers() {
        let value = json!({
            "name": "demo",
            "pipeline_id": 12,
            "ratio": 0.5,
            "events": ["PUSH"],
            "project": {"name": "p"},
            "admin": true,
            "nothing": null
        });
        let back = struct_to_value(Some(value_to_struct(&value)));
        assert_eq!(back, value);
        assert!(back["pipeline_id"].is_i64());
    }

    #[test]
    fn test_struct_to_value_none_is_empty_object() {
        assert_eq!(struct_to_value(None), json!({}));
    }

    #[test]
    fn test_unknown_detection() {
        let bag = json!({"name": "x", "project": {"name": UNKNOWN_SENTINEL}});
        assert!(contains_unknowns(&bag));
        assert!(!contains_unknowns(&json!({"name": "x"})));
    }

    #[test]
    fn test_value_to_id() {
        assert_eq!(value_to_id(&json!(42)), Some("42".to_string()));
        assert_eq!(value_to_id(&json!("abc")), Some("abc".to_string()));
        assert_eq!(value_to_id(&json!("")), None);
        assert_eq!(value_to_id(&json!(true)), None);
    }

    #[test]
    fn test_set_path_if_absent() {
        let mut bag = json!({"name": "x"});
        set_path_if_absent(&mut bag, &["project", "name"], json!("p"));
        set_path_if_absent(&mut bag, &["name"], json!("ignored"));
        assert_eq!(bag, json!({"name": "x", "project": {"name": "p"}}));
    }
}
