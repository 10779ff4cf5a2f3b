#![allow(clippy::result_large_err)] // Resolver returns AppError so strict-mode failures flow straight into the result envelope.

//! `{{ ... }}` expression resolution against an [`ExecutionContext`].
//!
//! Recognized forms are `$variables.<path>`, `$outputs.<nodeId>[.<path>]` and
//! `$env.<NAME>`. Everything else is left in place verbatim unless the
//! resolver runs in strict mode.

use crate::core::engine::context::ExecutionContext;
use crate::core::engine::path::{get_segments, parse_path, PathSegment};
use crate::core::engine::value::to_text;
use crate::core::error::AppError;
use crate::core::types::{codes, ErrorCategory};
use serde_json::{Map, Value};
use std::env;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expression<'a> {
    Variable(&'a str),
    Output { node_id: &'a str, path: &'a str },
    Env(&'a str),
    Unrecognized,
}

fn classify(expr: &str) -> Expression<'_> {
    if let Some(path) = expr.strip_prefix("$variables.") {
        return Expression::Variable(path);
    }
    if let Some(rest) = expr.strip_prefix("$outputs.") {
        let (node_id, path) = rest.split_once('.').unwrap_or((rest, ""));
        if node_id.is_empty() {
            return Expression::Unrecognized;
        }
        return Expression::Output { node_id, path };
    }
    if let Some(name) = expr.strip_prefix("$env.") {
        if !name.is_empty() {
            return Expression::Env(name);
        }
    }
    Expression::Unrecognized
}

/// Resolves template strings inside arbitrary value trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateResolver {
    strict: bool,
}

impl TemplateResolver {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Resolve every string leaf of `value`. Objects and arrays are walked
    /// structurally; other leaves are returned unchanged.
    pub fn resolve(&self, value: &Value, ctx: &ExecutionContext) -> Result<Value, AppError> {
        match value {
            Value::String(text) => Ok(Value::String(self.resolve_str(text, ctx)?)),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve(item, ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => self.resolve_map(map, ctx).map(Value::Object),
            other => Ok(other.clone()),
        }
    }

    pub fn resolve_map(
        &self,
        map: &Map<String, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Map<String, Value>, AppError> {
        let mut resolved = Map::with_capacity(map.len());
        for (key, child) in map {
            resolved.insert(key.clone(), self.resolve(child, ctx)?);
        }
        Ok(resolved)
    }

    pub fn resolve_str(&self, text: &str, ctx: &ExecutionContext) -> Result<String, AppError> {
        if !text.contains(OPEN) {
            return Ok(text.to_string());
        }
        let mut output = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(OPEN) {
            output.push_str(&rest[..start]);
            let after_open = &rest[start + OPEN.len()..];
            let Some(end) = after_open.find(CLOSE) else {
                output.push_str(&rest[start..]);
                return Ok(output);
            };
            let raw = &rest[start..start + OPEN.len() + end + CLOSE.len()];
            let expr = after_open[..end].trim();
            match classify(expr) {
                Expression::Unrecognized => {
                    if self.strict {
                        return Err(AppError::new(
                            ErrorCategory::ValidationError,
                            format!("unrecognized template expression '{}'", raw),
                        )
                        .with_code(codes::TEMPLATE_UNRESOLVED));
                    }
                    output.push_str(raw);
                }
                recognized => output.push_str(&lookup(recognized, ctx)),
            }
            rest = &after_open[end + CLOSE.len()..];
        }
        output.push_str(rest);
        Ok(output)
    }

    /// List every `{{ ... }}` fragment in `value` that would be left verbatim.
    pub fn unresolved_expressions(value: &Value) -> Vec<String> {
        let mut found = Vec::new();
        collect_unresolved(value, &mut found);
        found
    }
}

/// Lenient resolution: unrecognized expressions pass through unchanged.
pub fn resolve_value(value: &Value, ctx: &ExecutionContext) -> Value {
    TemplateResolver::new(false)
        .resolve(value, ctx)
        .unwrap_or_else(|_| value.clone())
}

fn lookup(expr: Expression<'_>, ctx: &ExecutionContext) -> String {
    match expr {
        Expression::Variable(path) => {
            let segments = parse_path(path);
            let Some((PathSegment::Key(first), rest)) = segments.split_first() else {
                return String::new();
            };
            ctx.variables
                .get(first)
                .and_then(|root| get_segments(root, rest))
                .map(to_text)
                .unwrap_or_default()
        }
        Expression::Output { node_id, path } => ctx
            .output(node_id)
            .and_then(|output| get_segments(output, &parse_path(path)))
            .map(to_text)
            .unwrap_or_default(),
        Expression::Env(name) => env::var(name).unwrap_or_default(),
        Expression::Unrecognized => String::new(),
    }
}

fn collect_unresolved(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            let mut rest = text.as_str();
            while let Some(start) = rest.find(OPEN) {
                let after_open = &rest[start + OPEN.len()..];
                let Some(end) = after_open.find(CLOSE) else {
                    break;
                };
                if classify(after_open[..end].trim()) == Expression::Unrecognized {
                    found.push(rest[start..start + OPEN.len() + end + CLOSE.len()].to_string());
                }
                rest = &after_open[end + CLOSE.len()..];
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_unresolved(item, found)),
        Value::Object(map) => map.values().for_each(|item| collect_unresolved(item, found)),
        _ => {}
    }
}
