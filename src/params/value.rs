//! Typed view-state values and their serde bridge.
//!
//! A page's filter/pagination state is any serde struct whose fields map to
//! the four [`ParamValue`] kinds. The bridge converts between the struct and
//! a [`ParamMap`] so the codec can work field-by-field.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

/// One URL-representable field value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
}

/// Field name → value, ordered for deterministic encoding.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// Converts a state struct into a [`ParamMap`].
///
/// Fails when the struct is not a flat object of strings, integers, booleans
/// and string arrays.
pub fn to_param_map<T: Serialize>(state: &T) -> Result<ParamMap, ApiError> {
    let value =
        serde_json::to_value(state).map_err(|err| ApiError::Decode(err.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(ApiError::Decode(
            "param state must serialize to an object".to_string(),
        ));
    };

    let mut map = ParamMap::new();
    for (key, value) in fields {
        map.insert(key.clone(), param_value_from_json(&key, value)?);
    }
    Ok(map)
}

/// Converts a [`ParamMap`] back into the state struct.
pub fn from_param_map<T: DeserializeOwned>(map: &ParamMap) -> Result<T, ApiError> {
    let mut fields = serde_json::Map::new();
    for (key, value) in map {
        fields.insert(key.clone(), param_value_to_json(value));
    }
    serde_json::from_value(Value::Object(fields)).map_err(|err| ApiError::Decode(err.to_string()))
}

fn param_value_from_json(key: &str, value: Value) -> Result<ParamValue, ApiError> {
    match value {
        Value::String(text) => Ok(ParamValue::Str(text)),
        Value::Bool(flag) => Ok(ParamValue::Bool(flag)),
        Value::Number(number) => number
            .as_i64()
            .map(ParamValue::Int)
            .ok_or_else(|| ApiError::Decode(format!("field `{key}` is not an integer"))),
        Value::Array(items) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(text) => list.push(text),
                    other => list.push(other.to_string()),
                }
            }
            Ok(ParamValue::List(list))
        }
        other => Err(ApiError::Decode(format!(
            "field `{key}` has unsupported value {other}"
        ))),
    }
}

fn param_value_to_json(value: &ParamValue) -> Value {
    match value {
        ParamValue::Str(text) => Value::String(text.clone()),
        ParamValue::Int(number) => Value::Number((*number).into()),
        ParamValue::Bool(flag) => Value::Bool(*flag),
        ParamValue::List(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
    }
}
