//! JSON <-> VQL value conversion utilities

use crate::value::{Feature, Value};

/// Convert serde_json::Value to a VQL Value
///
/// Arrays become tuples; objects have no value counterpart and map to `Null`
/// (use [`feature_from_json`] for records).
pub fn json_to_value(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => Value::Tuple(arr.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(_) => Value::Null,
    }
}

/// Convert a VQL Value to serde_json::Value
pub fn value_to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Tuple(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::SetRef(name) => serde_json::json!({ "wordset": name }),
    }
}

/// Build a feature from a JSON object; `None` for any other JSON value.
///
/// # Examples
///
/// ```
/// use vql_lang::convert::feature_from_json;
/// use vql_lang::Value;
///
/// let feature = feature_from_json(serde_json::json!({"chr": "chr1", "pos": 10})).unwrap();
/// assert_eq!(feature.get("pos"), Some(&Value::Integer(10)));
/// ```
pub fn feature_from_json(v: serde_json::Value) -> Option<Feature> {
    match v {
        serde_json::Value::Object(obj) => Some(
            obj.into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect(),
        ),
        _ => None,
    }
}
