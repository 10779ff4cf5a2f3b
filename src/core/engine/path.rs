//! Dotted-path access over JSON trees.
//!
//! Paths look like `a.b.c`, `items.0.name` or `items[0].name`. Lookups never
//! fail: a missing key, an out-of-range index or indexing into a scalar all
//! report "not found". Writes create missing intermediate containers and
//! return a [`PathError`] on type mismatches.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("cannot descend into {found} at segment '{segment}'")]
    TypeMismatch { segment: String, found: &'static str },
    #[error("index {index} is out of bounds for array of length {len}")]
    OutOfBounds { index: usize, len: usize },
}

/// Split a path into segments. Empty segments are skipped, so `""` and `"."`
/// both address the root.
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (head, rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if !head.is_empty() {
            segments.push(PathSegment::Key(head.to_string()));
        }
        let mut remaining = rest;
        while let Some(stripped) = remaining.strip_prefix('[') {
            match stripped.find(']') {
                Some(end) => {
                    let inner = stripped[..end].trim().trim_matches(|c| c == '"' || c == '\'');
                    match inner.parse::<usize>() {
                        Ok(index) => segments.push(PathSegment::Index(index)),
                        Err(_) => segments.push(PathSegment::Key(inner.to_string())),
                    }
                    remaining = &stripped[end + 1..];
                }
                None => {
                    segments.push(PathSegment::Key(remaining.to_string()));
                    remaining = "";
                }
            }
        }
    }
    segments
}

/// Read the value at `path`; `None` when any segment is missing.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    get_segments(root, &parse_path(path))
}

pub fn get_segments<'a>(root: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments {
        current = match (current, segment) {
            (Value::Object(map), PathSegment::Key(key)) => map.get(key)?,
            (Value::Object(map), PathSegment::Index(index)) => map.get(&index.to_string())?,
            (Value::Array(items), PathSegment::Index(index)) => items.get(*index)?,
            (Value::Array(items), PathSegment::Key(key)) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at `path`, creating objects (or arrays, for numeric
/// segments) along the way.
pub fn set_path(root: &mut Value, path: &str, value: Value) -> Result<(), PathError> {
    let segments = parse_path(path);
    if segments.is_empty() {
        return Err(PathError::Empty);
    }
    if root.is_null() {
        *root = empty_container_for(&segments[0]);
    }
    set_segments(root, &segments, value)
}

fn set_segments(target: &mut Value, segments: &[PathSegment], value: Value) -> Result<(), PathError> {
    let (segment, rest) = match segments.split_first() {
        Some(parts) => parts,
        None => {
            *target = value;
            return Ok(());
        }
    };
    let slot = child_slot(target, segment, rest.first())?;
    if rest.is_empty() {
        *slot = value;
        return Ok(());
    }
    if slot.is_null() {
        *slot = empty_container_for(&rest[0]);
    }
    set_segments(slot, rest, value)
}

fn child_slot<'a>(
    target: &'a mut Value,
    segment: &PathSegment,
    next: Option<&PathSegment>,
) -> Result<&'a mut Value, PathError> {
    let placeholder = || match next {
        Some(seg) => empty_container_for(seg),
        None => Value::Null,
    };
    match target {
        Value::Object(map) => {
            let key = match segment {
                PathSegment::Key(key) => key.clone(),
                PathSegment::Index(index) => index.to_string(),
            };
            Ok(map.entry(key).or_insert_with(placeholder))
        }
        Value::Array(items) => {
            let index = match segment {
                PathSegment::Index(index) => *index,
                PathSegment::Key(key) => key.parse::<usize>().map_err(|_| PathError::TypeMismatch {
                    segment: key.clone(),
                    found: "array",
                })?,
            };
            if index == items.len() {
                items.push(placeholder());
            }
            let len = items.len();
            items
                .get_mut(index)
                .ok_or(PathError::OutOfBounds { index, len })
        }
        other => Err(PathError::TypeMismatch {
            segment: match segment {
                PathSegment::Key(key) => key.clone(),
                PathSegment::Index(index) => index.to_string(),
            },
            found: type_name(other),
        }),
    }
}

fn empty_container_for(segment: &PathSegment) -> Value {
    match segment {
        PathSegment::Index(_) => Value::Array(Vec::new()),
        PathSegment::Key(_) => Value::Object(Map::new()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
