//! JSON Schema cleaning for function declarations.
//!
//! The backend rejects several JSON Schema keywords that OpenAI clients
//! routinely send. Cleaning removes them at every depth and leaves the rest
//! of the schema untouched.
//!
//! ## Removed
//!
//! - every key starting with `$` (`$schema`, `$ref`, `$defs`, `$id`, ...)
//! - `additionalProperties`
//! - `strict`
//! - `const`
//! - `exclusiveMinimum`, `exclusiveMaximum`
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use gemrelay::providers::gemini::convert::clean_schema;
//!
//! let schema = json!({
//!     "$schema": "http://json-schema.org/draft-07/schema#",
//!     "type": "object",
//!     "additionalProperties": false,
//!     "properties": {
//!         "age": { "type": "integer", "exclusiveMinimum": 0 }
//!     }
//! });
//!
//! assert_eq!(
//!     clean_schema(&schema),
//!     json!({ "type": "object", "properties": { "age": { "type": "integer" } } })
//! );
//! ```

use serde_json::{Map, Value};

/// Keywords dropped wherever they appear.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "additionalProperties",
    "strict",
    "const",
    "exclusiveMaximum",
    "exclusiveMinimum",
];

fn is_unsupported(key: &str) -> bool {
    key.starts_with('$') || UNSUPPORTED_KEYWORDS.contains(&key)
}

/// Return a copy of `schema` without unsupported keywords.
pub fn clean_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(obj) => Value::Object(clean_object(obj)),
        Value::Array(items) => Value::Array(items.iter().map(clean_schema).collect()),
        other => other.clone(),
    }
}

fn clean_object(obj: &Map<String, Value>) -> Map<String, Value> {
    obj.iter()
        .filter(|(key, _)| !is_unsupported(key))
        .map(|(key, value)| (key.clone(), clean_schema(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_nested_properties_cleaned() {
        let schema = json!({
            "type": "object",
            "strict": true,
            "properties": {
                "mode": { "type": "string", "const": "fast", "description": "speed" },
                "inner": {
                    "type": "object",
                    "additionalProperties": false,
                    "properties": { "n": { "type": "number", "exclusiveMaximum": 10 } }
                }
            },
            "required": ["mode"]
        });

        assert_eq!(
            clean_schema(&schema),
            json!({
                "type": "object",
                "properties": {
                    "mode": { "type": "string", "description": "speed" },
                    "inner": {
                        "type": "object",
                        "properties": { "n": { "type": "number" } }
                    }
                },
                "required": ["mode"]
            })
        );
    }

    #[test]
    fn test_arrays_of_schemas_cleaned() {
        let schema = json!({
            "anyOf": [
                { "$ref": "#/$defs/a", "type": "string" },
                { "type": "integer", "exclusiveMinimum": 1 }
            ],
            "$defs": { "a": { "type": "string" } }
        });
        assert_eq!(
            clean_schema(&schema),
            json!({ "anyOf": [ { "type": "string" }, { "type": "integer" } ] })
        );
    }

    #[test]
    fn test_scalars_and_enums_preserved() {
        let schema = json!({ "type": "string", "enum": ["a", "b"], "minLength": 1 });
        assert_eq!(clean_schema(&schema), schema);
        assert_eq!(clean_schema(&json!(true)), json!(true));
    }

    fn contains_unsupported(value: &Value) -> bool {
        match value {
            Value::Object(obj) => obj
                .iter()
                .any(|(k, v)| is_unsupported(k) || contains_unsupported(v)),
            Value::Array(items) => items.iter().any(contains_unsupported),
            _ => false,
        }
    }

    fn arb_schema() -> impl Strategy<Value = Value> {
        let key = prop_oneof![
            Just("type".to_string()),
            Just("description".to_string()),
            Just("strict".to_string()),
            Just("const".to_string()),
            Just("$ref".to_string()),
            Just("additionalProperties".to_string()),
            Just("exclusiveMinimum".to_string()),
            "[a-z]{1,6}",
        ];
        let leaf = prop_oneof![Just(Value::Null), any::<bool>().prop_map(Value::Bool), "[a-z]{0,4}".prop_map(Value::String)];
        leaf.prop_recursive(4, 32, 4, move |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map(key.clone(), inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_cleaning_removes_every_unsupported_key(schema in arb_schema()) {
            let cleaned = clean_schema(&schema);
            prop_assert!(!contains_unsupported(&cleaned));
            prop_assert_eq!(clean_schema(&cleaned), cleaned);
        }
    }
}
