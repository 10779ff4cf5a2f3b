#![allow(clippy::result_large_err)]

use super::require_items;
use crate::core::engine::value::to_number;
use crate::core::error::AppError;
use serde_json::{json, Map, Value};

/// Slice `items` to at most `maxIterations`; iteration itself belongs to the
/// calling graph walker.
pub fn run(values: &Map<String, Value>, default_max: usize) -> Result<Value, AppError> {
    let items = require_items(values, "loop")?;
    let max_iterations = values
        .get("maxIterations")
        .and_then(to_number)
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n as usize)
        .unwrap_or(default_max);

    let processed: Vec<Value> = items.iter().take(max_iterations).cloned().collect();
    Ok(json!({
        "total": items.len(),
        "processed": processed.len(),
        "items": processed,
    }))
}
