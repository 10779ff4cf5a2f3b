#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use serde_json::{json, Map, Value};

/// Variable assignment requested by a `set_variable` node. The executor
/// applies it to the context it hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: Value,
}

impl Assignment {
    pub fn to_value(&self) -> Value {
        json!({"name": self.name, "value": self.value})
    }
}

pub fn run(values: &Map<String, Value>) -> Result<Assignment, AppError> {
    let name = match values.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        _ => return Err(AppError::validation("set_variable requires a non-empty 'name'")),
    };
    let value = values.get("value").cloned().unwrap_or(Value::Null);
    Ok(Assignment { name, value })
}
