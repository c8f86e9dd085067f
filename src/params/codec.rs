//! Query-string codec for view state.
//!
//! The decoder never invents a value that is not derivable from the initial
//! defaults plus the URL; the encoder emits a patch that keeps URLs minimal
//! by removing keys whose value equals the default.

use super::value::{ParamMap, ParamValue};

/// Decodes query pairs against the initial defaults.
///
/// Keys not present in `initial` are ignored; keys absent from the URL keep
/// their initial value. Each field is parsed per its initial kind: strings
/// verbatim, integers via `i64` (parse failure = absent), booleans as `"1"` /
/// anything else, lists split on `','`.
pub fn decode(initial: &ParamMap, pairs: &[(String, String)]) -> ParamMap {
    let mut decoded = initial.clone();
    for (key, raw) in pairs {
        let Some(proto) = initial.get(key) else {
            continue;
        };
        let value = match proto {
            ParamValue::Str(_) => ParamValue::Str(raw.clone()),
            ParamValue::Int(_) => match raw.parse::<i64>() {
                Ok(number) => ParamValue::Int(number),
                Err(_) => continue,
            },
            ParamValue::Bool(_) => ParamValue::Bool(raw == "1"),
            ParamValue::List(_) => {
                ParamValue::List(raw.split(',').map(str::to_string).collect())
            }
        };
        decoded.insert(key.clone(), value);
    }
    decoded
}

/// Encodes a patch as `(key, Some(encoded))` to set or `(key, None)` to
/// remove.
///
/// A value equal to its initial default is removed, as is an explicit empty
/// list; the `""` vs `","` ambiguity never reaches the URL. Keys unknown to
/// `initial` are dropped.
pub fn encode_patch(initial: &ParamMap, patch: &ParamMap) -> Vec<(String, Option<String>)> {
    let mut encoded = Vec::with_capacity(patch.len());
    for (key, value) in patch {
        let Some(default) = initial.get(key) else {
            continue;
        };
        let removes = value == default
            || matches!(value, ParamValue::List(items) if items.is_empty());
        let action = if removes {
            None
        } else {
            Some(encode_value(value))
        };
        encoded.push((key.clone(), action));
    }
    encoded
}

fn encode_value(value: &ParamValue) -> String {
    match value {
        ParamValue::Str(text) => text.clone(),
        ParamValue::Int(number) => number.to_string(),
        ParamValue::Bool(true) => "1".to_string(),
        ParamValue::Bool(false) => "0".to_string(),
        ParamValue::List(items) => items.join(","),
    }
}
