//! Conversion between resource values and the JSON stored in state files

use serde_json::{Map, Number};
use vela_core::resource::Value;

/// Key marking an unresolved reference stored as JSON
const REF_KEY: &str = "$ref";

pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Int(n) => serde_json::Value::Number(Number::from(*n)),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
        Value::ResourceRef(binding, attr) => {
            let mut obj = Map::new();
            obj.insert(
                REF_KEY.to_string(),
                serde_json::Value::String(format!("{}.{}", binding, attr)),
            );
            serde_json::Value::Object(obj)
        }
    }
}

/// Convert JSON back to a value; `null` has no counterpart and yields `None`
pub fn json_to_value(json: &serde_json::Value) -> Option<Value> {
    match json {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => Some(match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::String(n.to_string()),
        }),
        serde_json::Value::String(s) => Some(Value::String(s.clone())),
        serde_json::Value::Array(items) => {
            Some(Value::List(items.iter().filter_map(json_to_value).collect()))
        }
        serde_json::Value::Object(obj) => {
            if obj.len() == 1
                && let Some(serde_json::Value::String(r)) = obj.get(REF_KEY)
                && let Some((binding, attr)) = r.rsplit_once('.')
            {
                return Some(Value::ResourceRef(binding.to_string(), attr.to_string()));
            }
            Some(Value::Map(
                obj.iter()
                    .filter_map(|(k, v)| json_to_value(v).map(|v| (k.clone(), v)))
                    .collect(),
            ))
        }
    }
}
