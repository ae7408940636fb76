//! Input validation against resource schemas.
//!
//! Check runs the proposed inputs through [`validate`] and hands any failures
//! back to the engine, which reports them against the offending property.
//!
//! # Example
//!
//! ```
//! use pulumi_resource_buddy::schema::{Attribute, ResourceSchema};
//! use pulumi_resource_buddy::validation::validate;
//! use serde_json::json;
//!
//! let schema = ResourceSchema::new("A group")
//!     .with_input("name", Attribute::required_string())
//!     .with_input("priority", Attribute::optional_int());
//!
//! assert!(validate(&schema, &json!({"name": "devs", "priority": 2})).is_empty());
//!
//! let failures = validate(&schema, &json!({"name": "devs", "priority": "high"}));
//! assert_eq!(failures.len(), 1);
//! assert_eq!(failures[0].property, "priority");
//! ```

use std::collections::BTreeMap;

use serde_json::Value;

use crate::properties::is_unknown;
use crate::schema::{Attribute, AttributeType, ResourceSchema};
use crate::types::CheckFailure;

/// Validate proposed inputs against a resource schema.
///
/// # Validation Rules
///
/// - Required inputs must be present and non-null
/// - Optional inputs may be absent or null
/// - Types must match the schema
/// - Unknown preview values are accepted for any type
/// - Properties not named in the schema are ignored
pub fn validate(schema: &ResourceSchema, value: &Value) -> Vec<CheckFailure> {
    validate_properties(&schema.inputs, value)
}

/// Validate a property bag against a set of attributes.
pub fn validate_properties(attrs: &BTreeMap<String, Attribute>, value: &Value) -> Vec<CheckFailure> {
    let mut failures = Vec::new();
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => {
            let empty = serde_json::Map::new();
            for (name, attr) in attrs {
                validate_attribute(attr, empty.get(name), name, &mut failures);
            }
            return failures;
        }
        other => {
            failures.push(CheckFailure::new(
                "",
                format!("Expected object, got {}", value_type_name(other)),
            ));
            return failures;
        }
    };

    for (name, attr) in attrs {
        validate_attribute(attr, obj.get(name), name, &mut failures);
    }
    failures
}

/// Check if inputs are valid against a schema.
pub fn is_valid(schema: &ResourceSchema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    failures: &mut Vec<CheckFailure>,
) {
    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                failures.push(CheckFailure::new(
                    path,
                    format!("Missing required property '{}'", path),
                ));
            }
        }
        Some(v) => validate_attribute_type(&attr.attr_type, v, path, failures),
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    failures: &mut Vec<CheckFailure>,
) {
    if is_unknown(value) {
        return;
    }
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                failures.push(type_error(path, "string", value));
            }
        }
        AttributeType::Integer => {
            if !is_integer(value) {
                failures.push(type_error(path, "integer", value));
            }
        }
        AttributeType::Number => {
            if !value.is_number() {
                failures.push(type_error(path, "number", value));
            }
        }
        AttributeType::Bool => {
            if !value.is_boolean() {
                failures.push(type_error(path, "boolean", value));
            }
        }
        AttributeType::List(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}[{}]", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, failures);
                }
            } else {
                failures.push(type_error(path, "array", value));
            }
        }
        AttributeType::Map(value_type) => {
            if let Some(obj) = value.as_object() {
                for (key, val) in obj {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, val, &key_path, failures);
                }
            } else {
                failures.push(type_error(path, "object", value));
            }
        }
        AttributeType::Dynamic => {}
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64()
                || n.is_u64()
                || n
                    .as_f64()
                    .map(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
                    .unwrap_or(false)
        }
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> CheckFailure {
    CheckFailure::new(
        path,
        format!(
            "Invalid type for property '{}': expected {}, got {}",
            path,
            expected,
            value_type_name(got)
        ),
    )
}
