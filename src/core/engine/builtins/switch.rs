#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use serde::Deserialize;
use serde_json::{json, Map, Value};

const DEFAULT_OUTPUT: &str = "default";

#[derive(Debug, Deserialize)]
struct Case {
    #[serde(default)]
    value: Value,
    output: Value,
}

/// Match `value` against `cases` by structural equality.
pub fn run(values: &Map<String, Value>) -> Result<Value, AppError> {
    let subject = values.get("value").cloned().unwrap_or(Value::Null);
    let cases: Vec<Case> = match values.get("cases") {
        None | Some(Value::Null) => Vec::new(),
        Some(raw) => serde_json::from_value(raw.clone())
            .map_err(|e| AppError::validation(format!("switch has malformed cases: {}", e)))?,
    };

    let matched = cases.into_iter().find(|case| case.value == subject);
    let (is_match, output) = match matched {
        Some(case) => (true, case.output),
        None => (
            false,
            values
                .get("default")
                .filter(|d| !d.is_null())
                .cloned()
                .unwrap_or_else(|| Value::String(DEFAULT_OUTPUT.to_string())),
        ),
    };

    Ok(json!({
        "matched": is_match,
        "output": output,
        "value": subject,
    }))
}
