//! Single-attempt HTTP execution: timeout, response decoding, data and error
//! extraction, rate-limit introspection.

use crate::core::engine::path::get_path;
use crate::core::engine::request::{sanitize_headers, HttpRequest, RequestBody};
use crate::core::engine::result::{
    ExecutionError, ExecutionMeta, ExecutionResult, RateLimitInfo, ResponseSnapshot,
};
use crate::core::engine::schema::ProviderConfig;
use crate::core::engine::value::to_text;
use crate::core::error::AppError;
use crate::core::types::{codes, ErrorCategory};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

const COMMON_ERROR_PATHS: [&str; 4] = ["error", "message", "error.message", "errors.0.message"];
const REMAINING_HEADERS: [&str; 2] = ["x-ratelimit-remaining", "ratelimit-remaining"];
const RESET_HEADERS: [&str; 2] = ["x-ratelimit-reset", "ratelimit-reset"];
const LIMIT_HEADERS: [&str; 2] = ["x-ratelimit-limit", "ratelimit-limit"];

#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    default_timeout_ms: u64,
}

impl Default for HttpExecutor {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), DEFAULT_TIMEOUT_MS)
    }
}

impl HttpExecutor {
    pub fn new(client: reqwest::Client, default_timeout_ms: u64) -> Self {
        Self {
            client,
            default_timeout_ms,
        }
    }

    /// Client with the given user agent; falls back to a plain client if the
    /// TLS backend cannot be initialized with it.
    pub fn with_user_agent(user_agent: &str, default_timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self::new(client, default_timeout_ms)
    }

    /// Issue `request` once. Never fails: transport problems, timeouts and
    /// non-2xx statuses all come back as failed results.
    pub async fn execute(
        &self,
        request: &HttpRequest,
        provider: &ProviderConfig,
        timeout_ms: Option<u64>,
        attempt: u32,
    ) -> ExecutionResult {
        let started = Instant::now();
        let timeout_ms = timeout_ms.unwrap_or(self.default_timeout_ms);
        let mut meta = ExecutionMeta {
            provider: Some(provider.id.clone()),
            request: Some(request.snapshot()),
            attempt,
            ..Default::default()
        };

        tracing::debug!(
            method = %request.method,
            url = %meta.request.as_ref().map(|r| r.url.as_str()).unwrap_or_default(),
            provider = %provider.id,
            attempt,
            "sending request"
        );

        let exchange = async {
            let response = self.prepare(request).send().await?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, headers, bytes))
        };

        let outcome = tokio::time::timeout(Duration::from_millis(timeout_ms), exchange).await;
        let (status, headers, bytes) = match outcome {
            Err(_) => {
                meta.duration_ms = elapsed_ms(started);
                let error = AppError::new(
                    ErrorCategory::TimeoutError,
                    format!("request timed out after {} ms", timeout_ms),
                );
                return ExecutionResult::failure(error).with_meta(meta);
            }
            Ok(Err(err)) => {
                meta.duration_ms = elapsed_ms(started);
                let error = if err.is_builder() {
                    AppError::validation(format!("invalid request: {}", err))
                } else {
                    AppError::new(ErrorCategory::NetworkError, format!("network error: {}", err))
                };
                return ExecutionResult::failure(error).with_meta(meta);
            }
            Ok(Ok(parts)) => parts,
        };

        let body = decode_body(&headers, &bytes);
        meta.duration_ms = elapsed_ms(started);
        meta.status_code = Some(status);
        meta.rate_limit = extract_rate_limit(&headers, provider);
        meta.response = Some(ResponseSnapshot {
            status,
            headers: sanitize_headers(&header_map(&headers)),
            body: Some(body.clone()),
        });

        if (200..300).contains(&status) {
            let data = extract_data(body, provider.data_path.as_deref());
            return ExecutionResult::success(data).with_meta(meta);
        }

        let message = extract_error_message(&body, provider.error_path.as_deref(), status);
        let error = ExecutionError::new(message)
            .with_code(codes::HTTP_ERROR)
            .with_status(status)
            .with_details(body);
        ExecutionResult::failure(error).with_meta(meta)
    }

    fn prepare(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        match &request.body {
            None => builder,
            Some(RequestBody::Text(text)) => builder.body(text.clone()),
            Some(RequestBody::Form(pairs)) => builder.form(pairs),
            Some(RequestBody::Json(value)) if request.header("content-type").is_some() => {
                builder.body(value.to_string())
            }
            Some(RequestBody::Json(value)) => builder.json(value),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn header_map(headers: &HeaderMap) -> IndexMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Decode by Content-Type: JSON parsed, text kept as text, anything else as a
/// base64 envelope.
pub fn decode_body(headers: &HeaderMap, bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    let content_type = header_value(headers, CONTENT_TYPE.as_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.contains("json") {
        if let Ok(parsed) = serde_json::from_slice::<Value>(bytes) {
            return parsed;
        }
    }
    let textual = content_type.is_empty()
        || content_type.contains("json")
        || content_type.starts_with("text/")
        || content_type.contains("xml")
        || content_type.contains("x-www-form-urlencoded")
        || content_type.contains("javascript");
    if textual {
        if let Ok(text) = std::str::from_utf8(bytes) {
            if content_type.is_empty() {
                if let Ok(parsed) = serde_json::from_str::<Value>(text) {
                    return parsed;
                }
            }
            return Value::String(text.to_string());
        }
    }
    json!({
        "encoding": "base64",
        "contentType": content_type,
        "size": bytes.len(),
        "data": STANDARD.encode(bytes),
    })
}

/// Success payload at `data_path`, or the whole body when unset or absent.
pub fn extract_data(body: Value, data_path: Option<&str>) -> Value {
    match data_path.filter(|path| !path.is_empty()) {
        Some(path) => match get_path(&body, path) {
            Some(data) => data.clone(),
            None => body,
        },
        None => body,
    }
}

pub fn extract_error_message(body: &Value, error_path: Option<&str>, status: u16) -> String {
    let configured = error_path.filter(|path| !path.is_empty());
    configured
        .into_iter()
        .chain(COMMON_ERROR_PATHS)
        .find_map(|path| get_path(body, path).and_then(message_text))
        .unwrap_or_else(|| status_message(status))
}

fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(_) | Value::Bool(_) => Some(to_text(value)),
        _ => None,
    }
}

pub fn status_message(status: u16) -> String {
    let message = match status {
        400 => "Bad request - check the request parameters",
        401 => "Unauthorized - check your credentials",
        403 => "Forbidden - insufficient permissions",
        404 => "Resource not found",
        429 => "Rate limit exceeded - try again later",
        500 => "Internal server error",
        502 => "Bad gateway",
        503 => "Service unavailable",
        _ => return format!("Request failed with status {}", status),
    };
    message.to_string()
}

fn first_header<'a>(
    headers: &'a HeaderMap,
    custom: Option<&'a str>,
    standard: &[&'a str],
) -> Option<&'a str> {
    custom
        .into_iter()
        .chain(standard.iter().copied())
        .find_map(|name| header_value(headers, name))
}

pub fn extract_rate_limit(headers: &HeaderMap, provider: &ProviderConfig) -> Option<RateLimitInfo> {
    let custom = provider.rate_limit_headers.clone().unwrap_or_default();
    let parse = |raw: Option<&str>| raw.and_then(|v| v.trim().parse::<u64>().ok());

    let remaining = parse(first_header(headers, custom.remaining.as_deref(), &REMAINING_HEADERS));
    let limit = parse(first_header(headers, custom.limit.as_deref(), &LIMIT_HEADERS));
    let reset_at = first_header(headers, custom.reset.as_deref(), &RESET_HEADERS)
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .and_then(|value| interpret_reset(value, Utc::now()));

    if remaining.is_none() && limit.is_none() && reset_at.is_none() {
        return None;
    }
    Some(RateLimitInfo {
        remaining,
        limit,
        reset_at,
    })
}

/// Reset values from 1e12 up are epoch milliseconds, from 1e9 epoch seconds,
/// anything smaller is seconds from `now`.
pub fn interpret_reset(value: f64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    if value >= 1e12 {
        Utc.timestamp_millis_opt(value as i64).single()
    } else if value >= 1e9 {
        Utc.timestamp_opt(value as i64, 0).single()
    } else {
        Some(now + ChronoDuration::milliseconds((value * 1000.0) as i64))
    }
}
