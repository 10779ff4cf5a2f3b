pub mod loader;
pub mod validation;

pub use loader::ConfigLoader;
pub use validation::ConfigValidator;

use crate::core::engine::schema::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine configuration loaded from flowent.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EngineConfig {
    /// Outbound HTTP settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Retry policy applied when a node carries none
    #[serde(default)]
    pub retry: RetryConfig,

    /// Template resolution settings
    #[serde(default)]
    pub templates: TemplateConfig,

    /// Limits for built-in nodes
    #[serde(default)]
    pub builtins: BuiltinsConfig,

    /// Limits for the `code` node interpreter
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Step recorder sink
    #[serde(default)]
    pub recorder: RecorderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    /// Default request timeout in milliseconds
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound of the random delay added to each backoff step
    #[serde(default)]
    pub jitter_ms: u64,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay_ms: self.delay_ms,
            backoff_multiplier: Some(self.backoff_multiplier),
            jitter_ms: (self.jitter_ms > 0).then_some(self.jitter_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TemplateConfig {
    /// Fail nodes whose values contain unrecognized `{{ ... }}` expressions
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuiltinsConfig {
    #[serde(default = "default_wait_cap_ms")]
    pub wait_cap_ms: u64,

    #[serde(default = "default_loop_max_iterations")]
    pub loop_max_iterations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SandboxConfig {
    /// Wall-clock bound for one script run
    #[serde(default = "default_sandbox_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_operations")]
    pub max_operations: u64,

    #[serde(default = "default_max_call_levels")]
    pub max_call_levels: usize,

    #[serde(default = "default_max_string_size")]
    pub max_string_size: usize,

    #[serde(default = "default_max_collection_size")]
    pub max_array_size: usize,

    #[serde(default = "default_max_collection_size")]
    pub max_map_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RecorderConfig {
    /// JSON-lines file receiving one record per executed node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// Default functions
fn default_http_timeout_ms() -> u64 {
    30_000
}

fn default_user_agent() -> String {
    format!("flowent/{}", crate::VERSION)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    1_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_wait_cap_ms() -> u64 {
    300_000
}

fn default_loop_max_iterations() -> usize {
    1_000
}

fn default_sandbox_timeout_ms() -> u64 {
    5_000
}

fn default_max_operations() -> u64 {
    1_000_000
}

fn default_max_call_levels() -> usize {
    64
}

fn default_max_string_size() -> usize {
    1_048_576
}

fn default_max_collection_size() -> usize {
    10_000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_http_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_ms: 0,
        }
    }
}

impl Default for BuiltinsConfig {
    fn default() -> Self {
        Self {
            wait_cap_ms: default_wait_cap_ms(),
            loop_max_iterations: default_loop_max_iterations(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_sandbox_timeout_ms(),
            max_operations: default_max_operations(),
            max_call_levels: default_max_call_levels(),
            max_string_size: default_max_string_size(),
            max_array_size: default_max_collection_size(),
            max_map_size: default_max_collection_size(),
        }
    }
}
