#![allow(clippy::result_large_err)]

use super::require_items;
use crate::core::engine::path::get_path;
use crate::core::engine::value::{number_value, to_number};
use crate::core::error::AppError;
use crate::core::types::codes;
use serde_json::{json, Map, Value};

pub fn run(values: &Map<String, Value>) -> Result<Value, AppError> {
    let items = require_items(values, "aggregate")?;
    let operation = match values.get("operation") {
        Some(Value::String(op)) => op.as_str(),
        _ => "count",
    };
    let projected: Vec<Value> = match values.get("field") {
        Some(Value::String(field)) if !field.is_empty() => items
            .iter()
            .map(|item| get_path(item, field).cloned().unwrap_or(Value::Null))
            .collect(),
        _ => items.clone(),
    };

    let result = aggregate(&projected, operation)?;
    Ok(json!({
        "result": result,
        "operation": operation,
        "itemCount": items.len(),
    }))
}

/// Apply one aggregate operation to already-projected values.
pub fn aggregate(values: &[Value], operation: &str) -> Result<Value, AppError> {
    let sum = || -> f64 { values.iter().map(|v| to_number(v).unwrap_or(0.0)).sum() };
    let numeric = || values.iter().filter_map(to_number).filter(|n| !n.is_nan());

    let result = match operation {
        "count" => json!(values.len()),
        "sum" => number_value(sum()),
        "avg" if values.is_empty() => json!(0),
        "avg" => number_value(sum() / values.len() as f64),
        "min" => numeric().reduce(f64::min).map(number_value).unwrap_or(Value::Null),
        "max" => numeric().reduce(f64::max).map(number_value).unwrap_or(Value::Null),
        "first" => values.first().cloned().unwrap_or(Value::Null),
        "last" => values.last().cloned().unwrap_or(Value::Null),
        "concat" => Value::Array(
            values
                .iter()
                .flat_map(|value| match value {
                    Value::Array(inner) => inner.clone(),
                    other => vec![other.clone()],
                })
                .collect(),
        ),
        other => {
            return Err(
                AppError::validation(format!("unknown aggregate operation '{}'", other))
                    .with_code(codes::UNKNOWN_OPERATION),
            )
        }
    };
    Ok(result)
}
