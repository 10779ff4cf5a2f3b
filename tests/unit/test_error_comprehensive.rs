use flowent::core::engine::result::ExecutionError;
use flowent::core::engine::ExecutionResult;
use flowent::core::error::AppError;
use flowent::core::types::{codes, ErrorCategory, ErrorSeverity};
use serde_json::json;

#[test]
fn test_error_creation_all_categories() {
    let categories = vec![
        (ErrorCategory::ValidationError, codes::VALIDATION_ERROR),
        (ErrorCategory::ConfigurationError, codes::CONFIG_ERROR),
        (ErrorCategory::AuthenticationError, codes::AUTH_FAILED),
        (ErrorCategory::NetworkError, codes::NETWORK_ERROR),
        (ErrorCategory::TimeoutError, codes::TIMEOUT),
        (ErrorCategory::HttpError, codes::HTTP_ERROR),
        (ErrorCategory::ScriptError, codes::SCRIPT_ERROR),
        (ErrorCategory::SerializationError, codes::VALIDATION_ERROR),
        (ErrorCategory::IoError, codes::INTERNAL_ERROR),
        (ErrorCategory::CancelledError, codes::CANCELLED),
        (ErrorCategory::InternalError, codes::INTERNAL_ERROR),
    ];

    for (category, code) in categories {
        let error = AppError::new(category, "test message");
        assert_eq!(error.category, category);
        assert_eq!(error.code, code);
        assert_eq!(error.message, "test message");
        assert!(error.context.is_empty());
        assert!(error.status_code.is_none());
        assert!(error.occurred_at <= chrono::Utc::now());
        assert!(error.source.is_none());
    }
}

#[test]
fn test_error_severity_mapping() {
    let test_cases = vec![
        (ErrorCategory::ValidationError, ErrorSeverity::Error),
        (ErrorCategory::NetworkError, ErrorSeverity::Error),
        (ErrorCategory::TimeoutError, ErrorSeverity::Error),
        (ErrorCategory::ScriptError, ErrorSeverity::Error),
        (ErrorCategory::CancelledError, ErrorSeverity::Warning),
    ];

    for (category, expected_severity) in test_cases {
        let error = AppError::new(category, "test");
        assert_eq!(error.severity(), expected_severity);
    }
}

#[test]
fn test_error_add_context() {
    let mut error = AppError::new(ErrorCategory::HttpError, "provider failed");

    error.add_context("provider", "crm");
    error.add_context("attempt", "2");

    assert_eq!(error.context.len(), 2);
    assert_eq!(error.context.get("provider"), Some(&"crm".to_string()));
    let rendered = error.to_string();
    assert!(rendered.starts_with("[HTTP_ERROR] HttpError: provider failed"));
}

#[test]
fn test_error_from_io_and_json() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
    let error: AppError = io.into();
    assert_eq!(error.category, ErrorCategory::IoError);
    assert!(error.source.is_some());

    let parse = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
    let error: AppError = parse.into();
    assert_eq!(error.category, ErrorCategory::SerializationError);
}

#[test]
fn test_error_converts_into_envelope() {
    let error = AppError::new(ErrorCategory::HttpError, "not found")
        .with_status(404)
        .with_details(json!({"error": "not found"}));
    let converted: ExecutionError = error.into();
    assert_eq!(converted.code.as_deref(), Some(codes::HTTP_ERROR));
    assert_eq!(converted.status_code, Some(404));
    assert!(!converted.is_retryable());

    let result = ExecutionResult::failure(AppError::new(ErrorCategory::TimeoutError, "slow"));
    assert!(!result.is_success());
    assert!(result.is_retryable_failure());
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["success"], json!(false));
    assert_eq!(value["error"]["code"], json!("TIMEOUT"));
    assert!(value.get("data").is_none());
}

#[test]
fn test_retryable_classification() {
    assert!(ExecutionError::new("down").with_status(503).is_retryable());
    assert!(ExecutionError::new("slow down").with_status(429).is_retryable());
    assert!(ExecutionError::new("network").with_code(codes::NETWORK_ERROR).is_retryable());
    assert!(!ExecutionError::new("invalid header").with_code(codes::VALIDATION_ERROR).is_retryable());
    assert!(!ExecutionError::new("bad").with_status(400).is_retryable());
    assert!(!ExecutionError::new("gone").with_status(404).is_retryable());
}
