#![allow(clippy::result_large_err)]

use crate::core::engine::value::to_number;
use crate::core::error::AppError;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleep for `duration` ms, capped at `cap_ms`.
pub async fn run(
    values: &Map<String, Value>,
    cap_ms: u64,
    cancel: &CancellationToken,
) -> Result<Value, AppError> {
    let requested = values
        .get("duration")
        .and_then(to_number)
        .filter(|n| n.is_finite() && *n > 0.0)
        .map(|n| n as u64)
        .unwrap_or(0);
    let waited = requested.min(cap_ms);
    if requested > cap_ms {
        tracing::debug!(requested, cap_ms, "wait duration capped");
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(AppError::cancelled()),
        _ = tokio::time::sleep(Duration::from_millis(waited)) => Ok(json!({"waited": waited})),
    }
}
