use serde::{Deserialize, Serialize};

/// Error category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    ValidationError,
    ConfigurationError,
    AuthenticationError,
    NetworkError,
    TimeoutError,
    HttpError,
    ScriptError,
    SerializationError,
    IoError,
    CancelledError,
    InternalError,
}

impl ErrorCategory {
    /// Machine code used when an error is raised without an explicit one.
    pub fn default_code(&self) -> &'static str {
        match self {
            ErrorCategory::ValidationError => codes::VALIDATION_ERROR,
            ErrorCategory::ConfigurationError => codes::CONFIG_ERROR,
            ErrorCategory::AuthenticationError => codes::AUTH_FAILED,
            ErrorCategory::NetworkError => codes::NETWORK_ERROR,
            ErrorCategory::TimeoutError => codes::TIMEOUT,
            ErrorCategory::HttpError => codes::HTTP_ERROR,
            ErrorCategory::ScriptError => codes::SCRIPT_ERROR,
            ErrorCategory::SerializationError => codes::VALIDATION_ERROR,
            ErrorCategory::IoError => codes::INTERNAL_ERROR,
            ErrorCategory::CancelledError => codes::CANCELLED,
            ErrorCategory::InternalError => codes::INTERNAL_ERROR,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Error severity enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Error,
    Warning,
    Info,
    Debug,
}

/// Stable machine codes carried in `ExecutionError::code`.
pub mod codes {
    pub const UNKNOWN_NODE_TYPE: &str = "UNKNOWN_NODE_TYPE";
    pub const PROVIDER_CONFIG_MISSING: &str = "PROVIDER_CONFIG_MISSING";
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
    pub const AUTH_FAILED: &str = "AUTH_FAILED";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const HTTP_ERROR: &str = "HTTP_ERROR";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const TEMPLATE_UNRESOLVED: &str = "TEMPLATE_UNRESOLVED";
    pub const SCRIPT_ERROR: &str = "SCRIPT_ERROR";
    pub const UNKNOWN_OPERATION: &str = "UNKNOWN_OPERATION";
    pub const CANCELLED: &str = "CANCELLED";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}
