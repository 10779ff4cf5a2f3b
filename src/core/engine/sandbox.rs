#![allow(clippy::result_large_err)]

//! Restricted script interpreter backing the `code` node.
//!
//! Scripts run in a raw Rhai engine carrying only the standard language
//! packages (no filesystem, network or process access), under operation,
//! depth and size limits, on a blocking thread bounded by a wall-clock
//! deadline. `print`/`debug` go to tracing.

use crate::core::config::SandboxConfig;
use crate::core::error::AppError;
use crate::core::types::{codes, ErrorCategory};
use rhai::packages::{Package, StandardPackage};
use rhai::{Array, Dynamic, Engine, EvalAltResult, Map, Scope};
use serde_json::{Map as JsonMap, Number, Value};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Bindings visible to a script as `input`, `variables` and `outputs`.
#[derive(Debug, Clone, Default)]
pub struct ScriptBindings {
    pub input: Value,
    pub variables: Value,
    pub outputs: Value,
}

#[derive(Debug, Clone)]
pub struct ScriptSandbox {
    config: SandboxConfig,
}

impl ScriptSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run `script` and convert its final value to JSON.
    pub async fn run(
        &self,
        script: &str,
        bindings: ScriptBindings,
        cancel: &CancellationToken,
    ) -> Result<Value, AppError> {
        if cancel.is_cancelled() {
            return Err(AppError::cancelled());
        }

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let deadline = Instant::now() + timeout;
        let config = self.config.clone();
        let script = script.to_string();
        let token = cancel.clone();

        let task = tokio::task::spawn_blocking(move || {
            let engine = build_engine(&config, deadline, token.clone());
            let mut scope = Scope::new();
            scope.push_dynamic("input", to_dynamic(&bindings.input));
            scope.push_dynamic("variables", to_dynamic(&bindings.variables));
            scope.push_dynamic("outputs", to_dynamic(&bindings.outputs));
            engine
                .eval_with_scope::<Dynamic>(&mut scope, &script)
                .map(from_dynamic)
                .map_err(|err| classify_error(*err, &token, config.timeout_ms))
        });

        // Grace period on top of the in-engine deadline so a script stuck in a
        // native call still yields a timeout here.
        let outer = timeout + Duration::from_millis(250);
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::cancelled()),
            joined = tokio::time::timeout(outer, task) => joined,
        };

        let value = match result {
            Err(_) => return Err(timeout_error(self.config.timeout_ms)),
            Ok(Err(join_err)) => {
                return Err(AppError::new(
                    ErrorCategory::InternalError,
                    format!("script worker failed: {}", join_err),
                ))
            }
            Ok(Ok(outcome)) => outcome?,
        };

        if cancel.is_cancelled() {
            return Err(AppError::cancelled());
        }
        Ok(value)
    }
}

fn build_engine(config: &SandboxConfig, deadline: Instant, cancel: CancellationToken) -> Engine {
    let mut engine = Engine::new_raw();
    engine.register_global_module(StandardPackage::new().as_shared_module());
    engine.set_max_operations(config.max_operations);
    engine.set_max_call_levels(config.max_call_levels);
    engine.set_max_expr_depths(64, 64);
    engine.set_max_string_size(config.max_string_size);
    engine.set_max_array_size(config.max_array_size);
    engine.set_max_map_size(config.max_map_size);
    engine.on_print(|text| tracing::info!(target: "flowent::script", "{}", text));
    engine.on_debug(|text, source, pos| {
        tracing::debug!(target: "flowent::script", source = source.unwrap_or_default(), position = %pos, "{}", text)
    });
    engine.on_progress(move |_operations| {
        if cancel.is_cancelled() || Instant::now() >= deadline {
            Some(Dynamic::UNIT)
        } else {
            None
        }
    });
    engine
}

fn timeout_error(timeout_ms: u64) -> AppError {
    AppError::new(
        ErrorCategory::TimeoutError,
        format!("script exceeded {} ms", timeout_ms),
    )
}

fn classify_error(err: EvalAltResult, cancel: &CancellationToken, timeout_ms: u64) -> AppError {
    match err {
        EvalAltResult::ErrorTerminated(..) if cancel.is_cancelled() => AppError::cancelled(),
        EvalAltResult::ErrorTerminated(..) => timeout_error(timeout_ms),
        EvalAltResult::ErrorRuntime(value, _) => script_error(value.to_string()),
        other => script_error(other.to_string()),
    }
}

fn script_error(message: String) -> AppError {
    AppError::new(ErrorCategory::ScriptError, message).with_code(codes::SCRIPT_ERROR)
}

fn to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Dynamic::from(i),
            None => Dynamic::from(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(items) => Dynamic::from_array(items.iter().map(to_dynamic).collect()),
        Value::Object(map) => {
            let mut rhai_map = Map::new();
            for (key, value) in map {
                rhai_map.insert(key.as_str().into(), to_dynamic(value));
            }
            Dynamic::from_map(rhai_map)
        }
    }
}

fn from_dynamic(value: Dynamic) -> Value {
    if value.is_unit() {
        return Value::Null;
    }
    if let Some(b) = value.clone().try_cast::<bool>() {
        return Value::Bool(b);
    }
    if let Some(i) = value.clone().try_cast::<i64>() {
        return Value::Number(Number::from(i));
    }
    if let Some(f) = value.clone().try_cast::<f64>() {
        return Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null);
    }
    if value.is_string() {
        return Value::String(value.to_string());
    }
    if let Some(c) = value.clone().try_cast::<char>() {
        return Value::String(c.to_string());
    }
    if let Some(arr) = value.clone().try_cast::<Array>() {
        return Value::Array(arr.into_iter().map(from_dynamic).collect());
    }
    if let Some(map) = value.clone().try_cast::<Map>() {
        let mut json_map = JsonMap::new();
        for (key, value) in map {
            json_map.insert(key.to_string(), from_dynamic(value));
        }
        return Value::Object(json_map);
    }
    Value::String(value.to_string())
}
