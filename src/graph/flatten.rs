//! Key flattening: nested JSON payloads -> flat parameter paths.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::ParameterPath;

/// Structural type of a leaf value as it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Integer,
    Number,
    Boolean,
    Null,
}

impl DataType {
    /// Infer the type from the value's own representation. Numeric strings stay strings.
    pub fn of(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(_) => Some(DataType::String),
            JsonValue::Number(n) if n.is_i64() || n.is_u64() => Some(DataType::Integer),
            JsonValue::Number(_) => Some(DataType::Number),
            JsonValue::Bool(_) => Some(DataType::Boolean),
            JsonValue::Null => Some(DataType::Null),
            JsonValue::Array(_) | JsonValue::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Integer => "integer",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::Null => "null",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One flattened leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatParam {
    pub path: ParameterPath,
    pub data_type: DataType,
    pub sample: JsonValue,
}

/// Flatten a parsed value below `prefix`.
///
/// Objects recurse per key, arrays per element (`[i]` on the owning segment),
/// scalars (including `null`) produce one entry each. Empty containers and a
/// scalar sitting at the root produce nothing.
pub fn flatten(value: &JsonValue, prefix: &ParameterPath) -> Vec<FlatParam> {
    let mut out = Vec::new();
    flatten_into(value, prefix, &mut out);
    out
}

fn flatten_into(value: &JsonValue, prefix: &ParameterPath, out: &mut Vec<FlatParam>) {
    // explicit stack so nesting depth is bounded by the heap, not the call stack;
    // children are pushed in reverse to keep document order
    let mut stack = vec![(value, prefix.clone())];
    while let Some((value, path)) = stack.pop() {
        match value {
            JsonValue::Object(map) => {
                stack.extend(map.iter().rev().map(|(key, child)| (child, path.child(key))));
            }
            JsonValue::Array(items) => {
                stack.extend(items.iter().enumerate().rev().map(|(i, item)| (item, path.index(i))));
            }
            scalar => {
                if path.is_root() {
                    continue;
                }
                if let Some(data_type) = DataType::of(scalar) {
                    out.push(FlatParam {
                        path,
                        data_type,
                        sample: scalar.clone(),
                    });
                }
            }
        }
    }
}

/// Parse a payload without serde_json's nesting limit.
fn parse_unbounded(text: &str) -> std::result::Result<JsonValue, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = JsonValue::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// Parse and flatten a raw payload text.
///
/// Absent, blank, `null`/`None` and malformed payloads all yield an empty
/// sequence; this never fails.
pub fn flatten_payload(text: Option<&str>) -> Vec<FlatParam> {
    try_flatten_payload(text).unwrap_or_else(|e| {
        log::debug!("Ignoring malformed JSON payload: {}", e);
        Vec::new()
    })
}

/// Like [`flatten_payload`] but surfaces parse errors so callers can log them
/// with context.
pub fn try_flatten_payload(text: Option<&str>) -> std::result::Result<Vec<FlatParam>, serde_json::Error> {
    match text.map(str::trim) {
        Some(t) if !t.is_empty() && t != "null" && t != "None" => {
            let value = parse_unbounded(t)?;
            Ok(flatten(&value, &ParameterPath::root()))
        }
        _ => Ok(Vec::new()),
    }
}
