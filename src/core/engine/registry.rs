#![allow(clippy::result_large_err)]

//! Node definition and provider configuration lookups.

use crate::core::engine::builtins::BuiltinNode;
use crate::core::engine::schema::{NodeDefinition, ProviderConfig};
use crate::core::engine::value::to_text;
use crate::core::error::AppError;
use crate::core::types::{codes, ErrorCategory};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

pub trait NodeRegistry: Send + Sync {
    fn node_by_id(&self, node_type: &str) -> Option<NodeDefinition>;
}

pub trait ProviderRegistry: Send + Sync {
    fn provider_config(&self, provider_id: &str) -> Option<ProviderConfig>;

    /// Endpoint template registered for `category:resource:operation`.
    fn operation_endpoint(&self, operation_key: &str) -> Option<String>;

    fn default_headers(&self, provider_id: &str) -> IndexMap<String, String> {
        self.provider_config(provider_id)
            .map(|provider| provider.default_headers)
            .unwrap_or_default()
    }

    fn build_api_url(
        &self,
        provider_id: &str,
        endpoint: &str,
        url_params: &IndexMap<String, String>,
    ) -> Result<String, AppError> {
        let provider = self.provider_config(provider_id).ok_or_else(|| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                format!("no provider config for '{}'", provider_id),
            )
            .with_code(codes::PROVIDER_CONFIG_MISSING)
        })?;
        compose_url(&provider.base_url, endpoint, url_params)
    }
}

/// Expand `{name}` placeholders in a base-URL template.
pub fn expand_base_url(
    template: &str,
    url_params: &IndexMap<String, String>,
) -> Result<String, AppError> {
    let mut expanded = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let name = &rest[start + 1..start + len];
        let value = url_params.get(name).ok_or_else(|| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                format!("base URL '{}' needs a value for '{{{}}}'", template, name),
            )
        })?;
        expanded.push_str(&rest[..start]);
        expanded.push_str(value);
        rest = &rest[start + len + 1..];
    }
    expanded.push_str(rest);
    Ok(expanded)
}

/// Join an expanded base URL with an endpoint. Absolute endpoints win.
pub fn compose_url(
    base_template: &str,
    endpoint: &str,
    url_params: &IndexMap<String, String>,
) -> Result<String, AppError> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return Ok(endpoint.to_string());
    }
    let base = expand_base_url(base_template, url_params)?;
    if base.is_empty() {
        return Ok(endpoint.to_string());
    }
    if endpoint.is_empty() {
        return Ok(base);
    }
    Ok(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    ))
}

/// Serialized form of a catalog file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    /// `category:resource:operation` -> endpoint template
    #[serde(default)]
    pub operations: IndexMap<String, String>,
}

/// In-memory registry implementing both lookups.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    nodes: IndexMap<String, NodeDefinition>,
    providers: IndexMap<String, ProviderConfig>,
    operations: IndexMap<String, String>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-populated with a definition for every built-in node type.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        for builtin in BuiltinNode::ALL {
            catalog.insert_node(NodeDefinition::new(builtin.node_type(), builtin.category()));
        }
        catalog
    }

    pub fn with_node(mut self, definition: NodeDefinition) -> Self {
        self.insert_node(definition);
        self
    }

    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.providers.insert(provider.id.clone(), provider);
        self
    }

    pub fn with_operation(mut self, key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.operations.insert(key.into(), endpoint.into());
        self
    }

    pub fn insert_node(&mut self, definition: NodeDefinition) {
        self.nodes.insert(definition.node_type.clone(), definition);
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeDefinition> {
        self.nodes.values()
    }

    pub fn extend(&mut self, file: CatalogFile) {
        for provider in file.providers {
            self.providers.insert(provider.id.clone(), provider);
        }
        for node in file.nodes {
            self.insert_node(node);
        }
        self.operations.extend(file.operations);
    }

    /// Load a YAML or JSON catalog on top of the built-in definitions.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read catalog {}: {}", path.display(), e),
            )
        })?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let file: CatalogFile = if is_json {
            serde_json::from_str(&content).map_err(|e| catalog_parse_error(path, e))?
        } else {
            serde_yaml::from_str(&content).map_err(|e| catalog_parse_error(path, e))?
        };

        let mut catalog = Self::with_builtins();
        catalog.extend(file);
        Ok(catalog)
    }
}

fn catalog_parse_error(path: &Path, err: impl std::fmt::Display) -> AppError {
    AppError::new(
        ErrorCategory::ConfigurationError,
        format!("Failed to parse catalog {}: {}", path.display(), err),
    )
}

impl NodeRegistry for StaticCatalog {
    fn node_by_id(&self, node_type: &str) -> Option<NodeDefinition> {
        self.nodes.get(node_type).cloned()
    }
}

impl ProviderRegistry for StaticCatalog {
    fn provider_config(&self, provider_id: &str) -> Option<ProviderConfig> {
        self.providers.get(provider_id).cloned()
    }

    fn operation_endpoint(&self, operation_key: &str) -> Option<String> {
        self.operations.get(operation_key).cloned()
    }
}

/// Flatten a JSON object of URL parameters into strings.
pub fn string_params(value: Option<&Value>) -> IndexMap<String, String> {
    match value {
        Some(Value::Object(map)) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), to_text(v)))
            .collect(),
        _ => IndexMap::new(),
    }
}
