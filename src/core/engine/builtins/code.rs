#![allow(clippy::result_large_err)]

use crate::core::engine::context::ExecutionContext;
use crate::core::engine::sandbox::{ScriptBindings, ScriptSandbox};
use crate::core::error::AppError;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

/// Run the `code` script with `input`, `variables` and `outputs` bound.
pub async fn run(
    values: &Map<String, Value>,
    ctx: &ExecutionContext,
    sandbox: &ScriptSandbox,
    cancel: &CancellationToken,
) -> Result<Value, AppError> {
    let script = match values.get("code") {
        Some(Value::String(code)) if !code.trim().is_empty() => code,
        _ => return Err(AppError::validation("code node requires a non-empty 'code' script")),
    };
    let bindings = ScriptBindings {
        input: values.get("input").cloned().unwrap_or(Value::Null),
        variables: ctx.variables_value(),
        outputs: ctx.outputs_value(),
    };
    sandbox.run(script, bindings, cancel).await
}
