use crate::Result;
use serde::Serialize;
use serde_json::Value;

/// Parses a YAML (or JSON) document into a JSON value.
pub fn yaml_to_json(data: &[u8]) -> Result<Value> {
    Ok(serde_yaml::from_slice(data)?)
}

pub fn json_to_yaml(value: &Value) -> Result<String> {
    to_yaml(value)
}

pub fn to_yaml<T: Serialize>(obj: &T) -> Result<String> {
    Ok(serde_yaml::to_string(obj)?)
}
