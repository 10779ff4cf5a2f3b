#![allow(clippy::result_large_err)]

use super::{ConfigValidator, EngineConfig};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_FILE_NAME: &str = "flowent.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from workspace root (workspace/flowent.toml).
    /// Environment variables override file values; the result is validated.
    pub fn load_from_workspace(workspace_path: &Path) -> Result<EngineConfig, AppError> {
        let config_path = workspace_path.join(CONFIG_FILE_NAME);
        let mut config = Self::load_from_file(&config_path)?.unwrap_or_default();

        Self::apply_env_overrides(&mut config);
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load config from a specific file path.
    /// Returns Ok(None) if the file doesn't exist.
    pub fn load_from_file(path: &Path) -> Result<Option<EngineConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: EngineConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
        })?;

        Ok(Some(config))
    }

    /// Apply environment variable overrides to the configuration.
    /// Unparseable values are ignored with a warning.
    pub fn apply_env_overrides(config: &mut EngineConfig) {
        if let Some(timeout) = parsed_env("FLOWENT_HTTP_TIMEOUT_MS") {
            config.http.timeout_ms = timeout;
        }

        if let Some(attempts) = parsed_env("FLOWENT_RETRY_MAX_ATTEMPTS") {
            config.retry.max_attempts = attempts;
        }

        if let Some(delay) = parsed_env("FLOWENT_RETRY_DELAY_MS") {
            config.retry.delay_ms = delay;
        }

        if let Some(jitter) = parsed_env("FLOWENT_RETRY_JITTER_MS") {
            config.retry.jitter_ms = jitter;
        }

        if let Some(strict) = parsed_env("FLOWENT_STRICT_TEMPLATES") {
            config.templates.strict = strict;
        }

        if let Some(timeout) = parsed_env("FLOWENT_SANDBOX_TIMEOUT_MS") {
            config.sandbox.timeout_ms = timeout;
        }

        if let Ok(path) = env::var("FLOWENT_RECORDER_PATH") {
            if !path.trim().is_empty() {
                config.recorder.path = Some(PathBuf::from(path));
            }
        }
    }

    /// Get documentation for supported environment variables
    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "FLOWENT_HTTP_TIMEOUT_MS - Override default request timeout (default: 30000)",
            "FLOWENT_RETRY_MAX_ATTEMPTS - Override default retry attempts (default: 3)",
            "FLOWENT_RETRY_DELAY_MS - Override base retry delay (default: 1000)",
            "FLOWENT_RETRY_JITTER_MS - Override retry jitter bound (default: 0)",
            "FLOWENT_STRICT_TEMPLATES - Fail on unrecognized template expressions (true/false)",
            "FLOWENT_SANDBOX_TIMEOUT_MS - Override code node wall-clock limit (default: 5000)",
            "FLOWENT_RECORDER_PATH - Append step records to this JSON-lines file",
        ]
    }
}

fn parsed_env<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}
