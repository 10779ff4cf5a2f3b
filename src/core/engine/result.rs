use crate::core::error::AppError;
use crate::core::types::codes;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Failure payload of an [`ExecutionResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status_code: None,
            details: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Network and timeout failures, 5xx and 429 may be retried. Other
    /// status-less failures (invalid requests, cancellation) are final.
    pub fn is_retryable(&self) -> bool {
        match self.status_code {
            None => matches!(
                self.code.as_deref(),
                Some(codes::NETWORK_ERROR) | Some(codes::TIMEOUT)
            ),
            Some(status) => status >= 500 || status == 429,
        }
    }
}

impl From<AppError> for ExecutionError {
    fn from(error: AppError) -> Self {
        ExecutionError {
            message: error.message,
            code: Some(error.code),
            status_code: error.status_code,
            details: error.details,
        }
    }
}

/// Rate-limit hints read from response headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
}

/// Sanitized view of the outbound request, kept for diagnostics only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSnapshot {
    pub status: u16,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMeta {
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitInfo>,
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(ExecutionError),
}

/// Uniform result envelope returned for every node execution.
///
/// Serializes as `{success, data | error, meta}`; exactly one of `data` and
/// `error` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ResultEnvelope", try_from = "ResultEnvelope")]
pub struct ExecutionResult {
    pub outcome: Outcome,
    pub meta: ExecutionMeta,
}

impl ExecutionResult {
    pub fn success(data: Value) -> Self {
        Self {
            outcome: Outcome::Success(data),
            meta: ExecutionMeta {
                attempt: 1,
                ..Default::default()
            },
        }
    }

    pub fn failure(error: impl Into<ExecutionError>) -> Self {
        Self {
            outcome: Outcome::Failure(error.into()),
            meta: ExecutionMeta {
                attempt: 1,
                ..Default::default()
            },
        }
    }

    pub fn with_meta(mut self, meta: ExecutionMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    pub fn data(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Success(data) => Some(data),
            Outcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ExecutionError> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure(error) => Some(error),
        }
    }

    /// Whether the retry loop may try again after this result.
    pub fn is_retryable_failure(&self) -> bool {
        self.error().map(ExecutionError::is_retryable).unwrap_or(false)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultEnvelope {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ExecutionError>,
    #[serde(default)]
    meta: ExecutionMeta,
}

impl From<ExecutionResult> for ResultEnvelope {
    fn from(result: ExecutionResult) -> Self {
        match result.outcome {
            Outcome::Success(data) => ResultEnvelope {
                success: true,
                data: Some(data),
                error: None,
                meta: result.meta,
            },
            Outcome::Failure(error) => ResultEnvelope {
                success: false,
                data: None,
                error: Some(error),
                meta: result.meta,
            },
        }
    }
}

impl TryFrom<ResultEnvelope> for ExecutionResult {
    type Error = String;

    fn try_from(envelope: ResultEnvelope) -> Result<Self, Self::Error> {
        let outcome = match (envelope.success, envelope.data, envelope.error) {
            (true, data, None) => Outcome::Success(data.unwrap_or(Value::Null)),
            (false, None, Some(error)) => Outcome::Failure(error),
            (true, _, Some(_)) => return Err("successful result must not carry an error".into()),
            (false, Some(_), _) => return Err("failed result must not carry data".into()),
            (false, None, None) => return Err("failed result must carry an error".into()),
        };
        Ok(ExecutionResult {
            outcome,
            meta: envelope.meta,
        })
    }
}
