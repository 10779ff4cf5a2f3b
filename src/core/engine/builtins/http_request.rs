#![allow(clippy::result_large_err)]

use crate::core::engine::registry::string_params;
use crate::core::engine::request::{encode_body, explicit_method, finalize_url, HttpRequest};
use crate::core::error::AppError;
use reqwest::Method;
use serde_json::{Map, Value};

/// Request for the raw `http_request` node: caller-supplied method, url,
/// headers, query and body with no provider assumptions.
pub fn build_request(values: &Map<String, Value>) -> Result<HttpRequest, AppError> {
    let raw_url = match values.get("url") {
        Some(Value::String(url)) if !url.trim().is_empty() => url.trim(),
        _ => return Err(AppError::validation("http_request requires a 'url'")),
    };
    let method = explicit_method(values)?.unwrap_or(Method::GET);
    let headers = string_params(values.get("headers"));
    let query = string_params(values.get("query"));
    let url = finalize_url(raw_url, query.iter())?;
    let body = values
        .get("body")
        .cloned()
        .and_then(|body| encode_body(body, &headers));

    Ok(HttpRequest {
        method,
        url,
        headers,
        body,
    })
}
