#![allow(clippy::result_large_err)]

use super::{parse_conditions, require_items};
use crate::core::engine::condition::Combinator;
use crate::core::error::AppError;
use serde_json::{json, Map, Value};

/// Keep the items satisfying every condition.
pub fn run(values: &Map<String, Value>) -> Result<Value, AppError> {
    let items = require_items(values, "filter")?;
    let conditions = parse_conditions(values, "filter")?;

    let kept: Vec<Value> = items
        .iter()
        .filter(|item| Combinator::And.combine(&conditions, item))
        .cloned()
        .collect();

    Ok(json!({
        "originalCount": items.len(),
        "filteredCount": kept.len(),
        "items": kept,
    }))
}
