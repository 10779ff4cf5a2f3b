#![allow(clippy::result_large_err)]

use super::EngineConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration rules
    pub fn validate(config: &EngineConfig) -> Result<(), AppError> {
        if config.http.timeout_ms == 0 {
            return Err(invalid("http.timeout_ms must be greater than zero"));
        }

        if config.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be at least 1"));
        }

        let multiplier = config.retry.backoff_multiplier;
        if multiplier.is_nan() || multiplier < 1.0 {
            return Err(invalid("retry.backoff_multiplier must be at least 1.0"));
        }

        if config.builtins.wait_cap_ms == 0 {
            return Err(invalid("builtins.wait_cap_ms must be greater than zero"));
        }

        if config.sandbox.timeout_ms == 0 {
            return Err(invalid("sandbox.timeout_ms must be greater than zero"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> AppError {
    AppError::new(ErrorCategory::ConfigurationError, message)
}
