#![allow(clippy::result_large_err)]

use super::parse_conditions;
use crate::core::engine::condition::Combinator;
use crate::core::engine::context::ExecutionContext;
use crate::core::error::AppError;
use serde_json::{json, Map, Value};

/// Evaluate `conditions` against the variable mapping. An empty list is
/// `true` under `and` and `false` under `or`.
pub fn run(values: &Map<String, Value>, ctx: &ExecutionContext) -> Result<Value, AppError> {
    let conditions = parse_conditions(values, "if")?;
    let combinator: Combinator = match values.get("combinator") {
        None | Some(Value::Null) => Combinator::default(),
        Some(raw) => serde_json::from_value(raw.clone()).map_err(|_| {
            AppError::validation(format!("if: unknown combinator {}", raw))
        })?,
    };

    let result = combinator.combine(&conditions, &ctx.variables_value());
    Ok(json!({
        "result": result,
        "branch": if result { "true" } else { "false" },
    }))
}
