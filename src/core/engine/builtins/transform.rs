#![allow(clippy::result_large_err)]

use crate::core::engine::path::{get_path, set_path};
use crate::core::engine::value::{is_truthy, number_value, to_number, to_text};
use crate::core::error::AppError;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
struct Mapping {
    source: String,
    target: String,
    #[serde(default)]
    transform: Option<String>,
}

/// Copy `source` paths of `input` to `target` paths of a fresh object,
/// applying an optional scalar transform on the way.
pub fn run(values: &Map<String, Value>) -> Result<Value, AppError> {
    let input = values.get("input").cloned().unwrap_or(Value::Null);
    let mappings: Vec<Mapping> = match values.get("mappings") {
        None | Some(Value::Null) => Vec::new(),
        Some(raw) => serde_json::from_value(raw.clone())
            .map_err(|e| AppError::validation(format!("transform has malformed mappings: {}", e)))?,
    };
    if mappings.is_empty() {
        return Ok(input);
    }

    let mut output = Value::Object(Map::new());
    for mapping in &mappings {
        let source = get_path(&input, &mapping.source).cloned().unwrap_or(Value::Null);
        let value = match mapping.transform.as_deref() {
            Some(name) => apply(name, source)?,
            None => source,
        };
        set_path(&mut output, &mapping.target, value).map_err(|e| {
            AppError::validation(format!(
                "transform cannot write '{}': {}",
                mapping.target, e
            ))
        })?;
    }
    Ok(output)
}

/// Named scalar transform. Unknown names leave the value unchanged.
pub fn apply(name: &str, value: Value) -> Result<Value, AppError> {
    let transformed = match name {
        "toString" => Value::String(to_text(&value)),
        "toNumber" => to_number(&value).map(number_value).unwrap_or(Value::Null),
        "toBoolean" => Value::Bool(is_truthy(&value)),
        "toUpperCase" => Value::String(to_text(&value).to_uppercase()),
        "toLowerCase" => Value::String(to_text(&value).to_lowercase()),
        "trim" => Value::String(to_text(&value).trim().to_string()),
        "parseJson" => match value {
            Value::String(text) => serde_json::from_str(&text)
                .map_err(|e| AppError::validation(format!("parseJson failed: {}", e)))?,
            other => other,
        },
        "stringify" => Value::String(serde_json::to_string(&value)?),
        _ => value,
    };
    Ok(transformed)
}
