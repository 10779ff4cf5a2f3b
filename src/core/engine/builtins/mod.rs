#![allow(clippy::result_large_err)]

//! In-process interpreter for built-in node types.

pub mod aggregate;
pub mod code;
pub mod filter;
pub mod http_request;
pub mod if_else;
pub mod loop_node;
pub mod set_variable;
pub mod switch;
pub mod transform;
pub mod wait;

use crate::core::config::BuiltinsConfig;
use crate::core::engine::condition::Condition;
use crate::core::engine::context::ExecutionContext;
use crate::core::engine::http::HttpExecutor;
use crate::core::engine::result::{ExecutionMeta, ExecutionResult};
use crate::core::engine::retry::execute_with_retry;
use crate::core::engine::sandbox::ScriptSandbox;
use crate::core::engine::schema::{ProviderConfig, RetryPolicy};
use crate::core::error::AppError;
use serde_json::{Map, Value};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinNode {
    HttpRequest,
    Code,
    SetVariable,
    If,
    Switch,
    Loop,
    Wait,
    Filter,
    Transform,
    Aggregate,
}

impl BuiltinNode {
    pub const ALL: [BuiltinNode; 10] = [
        BuiltinNode::HttpRequest,
        BuiltinNode::Code,
        BuiltinNode::SetVariable,
        BuiltinNode::If,
        BuiltinNode::Switch,
        BuiltinNode::Loop,
        BuiltinNode::Wait,
        BuiltinNode::Filter,
        BuiltinNode::Transform,
        BuiltinNode::Aggregate,
    ];

    pub fn from_type(node_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|builtin| builtin.node_type() == node_type)
    }

    pub fn node_type(&self) -> &'static str {
        match self {
            BuiltinNode::HttpRequest => "http_request",
            BuiltinNode::Code => "code",
            BuiltinNode::SetVariable => "set_variable",
            BuiltinNode::If => "if",
            BuiltinNode::Switch => "switch",
            BuiltinNode::Loop => "loop",
            BuiltinNode::Wait => "wait",
            BuiltinNode::Filter => "filter",
            BuiltinNode::Transform => "transform",
            BuiltinNode::Aggregate => "aggregate",
        }
    }

    /// `flow` for constructs a graph walker branches or iterates on.
    pub fn category(&self) -> &'static str {
        match self {
            BuiltinNode::If | BuiltinNode::Switch | BuiltinNode::Loop | BuiltinNode::Filter => {
                "flow"
            }
            _ => "core",
        }
    }
}

/// Inputs for one built-in execution.
pub struct BuiltinCall<'a> {
    pub values: &'a Map<String, Value>,
    pub ctx: &'a ExecutionContext,
    pub retry: &'a RetryPolicy,
    pub timeout_ms: Option<u64>,
    pub cancel: &'a CancellationToken,
}

/// Result of a built-in plus the variable assignment it requests, if any.
#[derive(Debug, Clone)]
pub struct BuiltinRun {
    pub result: ExecutionResult,
    pub assignment: Option<(String, Value)>,
}

impl BuiltinRun {
    fn from_result(result: ExecutionResult) -> Self {
        Self {
            result,
            assignment: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuiltinInterpreter {
    limits: BuiltinsConfig,
    sandbox: ScriptSandbox,
    http: HttpExecutor,
}

impl BuiltinInterpreter {
    pub fn new(limits: BuiltinsConfig, sandbox: ScriptSandbox, http: HttpExecutor) -> Self {
        Self {
            limits,
            sandbox,
            http,
        }
    }

    pub async fn execute(&self, node: BuiltinNode, call: BuiltinCall<'_>) -> BuiltinRun {
        let started = Instant::now();
        let outcome = match node {
            BuiltinNode::HttpRequest => return self.execute_http(call).await,
            BuiltinNode::SetVariable => match set_variable::run(call.values) {
                Ok(assignment) => {
                    let data = assignment.to_value();
                    let mut run = BuiltinRun::from_result(ExecutionResult::success(data));
                    run.assignment = Some((assignment.name, assignment.value));
                    run.result.meta = builtin_meta(node, started);
                    return run;
                }
                Err(err) => Err(err),
            },
            BuiltinNode::Code => code::run(call.values, call.ctx, &self.sandbox, call.cancel).await,
            BuiltinNode::If => if_else::run(call.values, call.ctx),
            BuiltinNode::Switch => switch::run(call.values),
            BuiltinNode::Loop => loop_node::run(call.values, self.limits.loop_max_iterations),
            BuiltinNode::Wait => wait::run(call.values, self.limits.wait_cap_ms, call.cancel).await,
            BuiltinNode::Filter => filter::run(call.values),
            BuiltinNode::Transform => transform::run(call.values),
            BuiltinNode::Aggregate => aggregate::run(call.values),
        };

        let result = match outcome {
            Ok(data) => ExecutionResult::success(data),
            Err(err) => ExecutionResult::failure(err),
        };
        BuiltinRun::from_result(result.with_meta(builtin_meta(node, started)))
    }

    async fn execute_http(&self, call: BuiltinCall<'_>) -> BuiltinRun {
        let request = match http_request::build_request(call.values) {
            Ok(request) => request,
            Err(err) => {
                let meta = builtin_meta(BuiltinNode::HttpRequest, Instant::now());
                return BuiltinRun::from_result(ExecutionResult::failure(err).with_meta(meta));
            }
        };
        let provider = ProviderConfig::passthrough();
        let result = execute_with_retry(call.retry, call.cancel, |attempt| {
            self.http
                .execute(&request, &provider, call.timeout_ms, attempt)
        })
        .await;
        BuiltinRun::from_result(result)
    }
}

fn builtin_meta(node: BuiltinNode, started: Instant) -> ExecutionMeta {
    ExecutionMeta {
        duration_ms: started.elapsed().as_millis() as u64,
        node_type: Some(node.node_type().to_string()),
        attempt: 1,
        ..Default::default()
    }
}

/// The `items` field as a sequence; anything else is a validation failure.
pub(crate) fn require_items<'a>(
    values: &'a Map<String, Value>,
    node_type: &str,
) -> Result<&'a Vec<Value>, AppError> {
    match values.get("items") {
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(AppError::validation(format!(
            "{} expects 'items' to be an array, got {}",
            node_type,
            type_name(other)
        ))),
        None => Err(AppError::validation(format!(
            "{} requires an 'items' array",
            node_type
        ))),
    }
}

pub(crate) fn parse_conditions(
    values: &Map<String, Value>,
    node_type: &str,
) -> Result<Vec<Condition>, AppError> {
    match values.get("conditions") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| {
            AppError::validation(format!("{} has malformed conditions: {}", node_type, e))
        }),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
