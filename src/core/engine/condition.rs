//! Single-predicate evaluation backing the `if` and `filter` built-ins.

use crate::core::engine::path::get_path;
use crate::core::engine::value::{loose_equals, strict_equals, to_number, to_text};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOperator {
    Equals,
    StrictEquals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    GreaterThanOrEquals,
    LessThanOrEquals,
    IsEmpty,
    IsNotEmpty,
    Regex,
}

impl FromStr for ConditionOperator {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let operator = match value {
            "equals" | "==" => ConditionOperator::Equals,
            "strictEquals" | "===" => ConditionOperator::StrictEquals,
            "notEquals" | "!=" => ConditionOperator::NotEquals,
            "contains" => ConditionOperator::Contains,
            "notContains" => ConditionOperator::NotContains,
            "startsWith" => ConditionOperator::StartsWith,
            "endsWith" => ConditionOperator::EndsWith,
            "greaterThan" | ">" => ConditionOperator::GreaterThan,
            "lessThan" | "<" => ConditionOperator::LessThan,
            "greaterThanOrEquals" | ">=" => ConditionOperator::GreaterThanOrEquals,
            "lessThanOrEquals" | "<=" => ConditionOperator::LessThanOrEquals,
            "isEmpty" => ConditionOperator::IsEmpty,
            "isNotEmpty" => ConditionOperator::IsNotEmpty,
            "regex" => ConditionOperator::Regex,
            other => return Err(format!("unknown condition operator '{}'", other)),
        };
        Ok(operator)
    }
}

impl ConditionOperator {
    pub fn apply(&self, field: &Value, compare: &Value) -> bool {
        match self {
            ConditionOperator::Equals => loose_equals(field, compare),
            ConditionOperator::StrictEquals => strict_equals(field, compare),
            ConditionOperator::NotEquals => !loose_equals(field, compare),
            ConditionOperator::Contains => contains(field, compare),
            ConditionOperator::NotContains => !contains(field, compare),
            ConditionOperator::StartsWith => to_text(field).starts_with(&to_text(compare)),
            ConditionOperator::EndsWith => to_text(field).ends_with(&to_text(compare)),
            ConditionOperator::GreaterThan => compare_numbers(field, compare, |a, b| a > b),
            ConditionOperator::LessThan => compare_numbers(field, compare, |a, b| a < b),
            ConditionOperator::GreaterThanOrEquals => {
                compare_numbers(field, compare, |a, b| a >= b)
            }
            ConditionOperator::LessThanOrEquals => compare_numbers(field, compare, |a, b| a <= b),
            ConditionOperator::IsEmpty => is_empty(field),
            ConditionOperator::IsNotEmpty => !is_empty(field),
            ConditionOperator::Regex => match Regex::new(&to_text(compare)) {
                Ok(pattern) => pattern.is_match(&to_text(field)),
                Err(err) => {
                    tracing::debug!(pattern = %to_text(compare), error = %err, "invalid regex in condition");
                    false
                }
            },
        }
    }
}

/// Evaluate `field <operator> compare`. Unknown operators evaluate to `false`.
pub fn evaluate(field: &Value, operator: &str, compare: &Value) -> bool {
    match operator.parse::<ConditionOperator>() {
        Ok(op) => op.apply(field, compare),
        Err(_) => false,
    }
}

fn contains(field: &Value, compare: &Value) -> bool {
    match field {
        Value::Array(items) => items.iter().any(|item| loose_equals(item, compare)),
        Value::String(text) => text.contains(&to_text(compare)),
        Value::Object(map) => match compare {
            Value::String(key) => map.contains_key(key),
            _ => false,
        },
        Value::Null => false,
        other => to_text(other).contains(&to_text(compare)),
    }
}

fn compare_numbers(field: &Value, compare: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (to_number(field), to_number(compare)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// One `{field, operator, value}` predicate as configured on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    /// Evaluate against `subject`, reading `field` as a dotted path. An empty
    /// field (or `.`) addresses the subject itself; missing paths read as null.
    pub fn evaluate_against(&self, subject: &Value) -> bool {
        let field_value = get_path(subject, &self.field).unwrap_or(&Value::Null);
        evaluate(field_value, &self.operator, &self.value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    pub fn combine(&self, conditions: &[Condition], subject: &Value) -> bool {
        match self {
            Combinator::And => conditions.iter().all(|c| c.evaluate_against(subject)),
            Combinator::Or => conditions.iter().any(|c| c.evaluate_against(subject)),
        }
    }
}
