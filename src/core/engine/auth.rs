#![allow(clippy::result_large_err)]

//! Credential resolution for provider calls.

use crate::core::engine::context::ExecutionContext;
use crate::core::engine::registry::compose_url;
use crate::core::engine::schema::ProviderConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Request-level authentication produced from a stored credential.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAuth {
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub query: IndexMap<String, String>,
    /// Values for base-URL placeholders (instance, region, ...).
    #[serde(default)]
    pub url_params: IndexMap<String, String>,
}

/// Who is asking for a credential, passed along for auditing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    pub workflow_id: String,
    pub execution_id: String,
    pub node_id: String,
    pub source: String,
}

impl AuthContext {
    pub fn from_execution(ctx: &ExecutionContext) -> Self {
        Self {
            user_id: ctx.user_id.clone(),
            workspace_id: ctx.workspace_id.clone(),
            workflow_id: ctx.workflow_id.clone(),
            execution_id: ctx.execution_id.clone(),
            node_id: ctx.node_id.clone(),
            source: "workflow".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthRequest {
    pub provider_id: String,
    pub credential_id: String,
    pub context: AuthContext,
    pub url_params: IndexMap<String, String>,
}

#[async_trait]
pub trait AuthResolver: Send + Sync {
    async fn resolve_auth(&self, request: AuthRequest) -> Result<ResolvedAuth, AppError>;

    /// Full request URL; node-supplied URL parameters override the credential's.
    fn build_provider_url(
        &self,
        provider: &ProviderConfig,
        endpoint: &str,
        auth: &ResolvedAuth,
        url_params: &IndexMap<String, String>,
    ) -> Result<String, AppError> {
        let mut params = auth.url_params.clone();
        params.extend(url_params.iter().map(|(k, v)| (k.clone(), v.clone())));
        compose_url(&provider.base_url, endpoint, &params)
    }

    fn merge_headers(
        &self,
        auth: &ResolvedAuth,
        custom: &IndexMap<String, String>,
        defaults: &IndexMap<String, String>,
    ) -> IndexMap<String, String> {
        merge_headers(&[defaults, &auth.headers, custom])
    }
}

/// Merge header maps left to right; later names replace earlier ones
/// case-insensitively.
pub fn merge_headers(layers: &[&IndexMap<String, String>]) -> IndexMap<String, String> {
    let mut merged: IndexMap<String, String> = IndexMap::new();
    for layer in layers {
        for (name, value) in layer.iter() {
            merged.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
            merged.insert(name.clone(), value.clone());
        }
    }
    merged
}

/// Resolver for deployments without stored credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

#[async_trait]
impl AuthResolver for NoAuth {
    async fn resolve_auth(&self, request: AuthRequest) -> Result<ResolvedAuth, AppError> {
        Err(AppError::new(
            ErrorCategory::AuthenticationError,
            format!(
                "credential '{}' cannot be resolved: no credential store configured",
                request.credential_id
            ),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialKind {
    Bearer {
        token: String,
    },
    ApiKeyHeader {
        #[serde(default = "default_api_key_header")]
        header: String,
        key: String,
    },
    ApiKeyQuery {
        param: String,
        key: String,
    },
    Basic {
        username: String,
        password: String,
    },
    Headers {
        headers: IndexMap<String, String>,
    },
}

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredential {
    #[serde(flatten)]
    pub kind: CredentialKind,
    /// Restricts the credential to one provider when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub url_params: IndexMap<String, String>,
}

impl StoredCredential {
    pub fn new(kind: CredentialKind) -> Self {
        Self {
            kind,
            provider: None,
            url_params: IndexMap::new(),
        }
    }

    pub fn for_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_url_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_params.insert(name.into(), value.into());
        self
    }

    fn resolve(&self) -> ResolvedAuth {
        let mut auth = ResolvedAuth {
            url_params: self.url_params.clone(),
            ..Default::default()
        };
        match &self.kind {
            CredentialKind::Bearer { token } => {
                auth.headers
                    .insert("Authorization".to_string(), format!("Bearer {}", token));
            }
            CredentialKind::ApiKeyHeader { header, key } => {
                auth.headers.insert(header.clone(), key.clone());
            }
            CredentialKind::ApiKeyQuery { param, key } => {
                auth.query.insert(param.clone(), key.clone());
            }
            CredentialKind::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{}:{}", username, password));
                auth.headers
                    .insert("Authorization".to_string(), format!("Basic {}", encoded));
            }
            CredentialKind::Headers { headers } => {
                auth.headers.extend(headers.clone());
            }
        }
        auth
    }
}

/// Credential store held in memory, keyed by credential id.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthResolver {
    credentials: HashMap<String, StoredCredential>,
}

impl StaticAuthResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(mut self, id: impl Into<String>, credential: StoredCredential) -> Self {
        self.credentials.insert(id.into(), credential);
        self
    }

    /// Load a YAML mapping of credential id to credential.
    pub fn from_yaml_file(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read credentials {}: {}", path.display(), e),
            )
        })?;
        let credentials: HashMap<String, StoredCredential> = serde_yaml::from_str(&content)
            .map_err(|e| {
                AppError::new(
                    ErrorCategory::ConfigurationError,
                    format!("Failed to parse credentials {}: {}", path.display(), e),
                )
            })?;
        Ok(Self { credentials })
    }
}

#[async_trait]
impl AuthResolver for StaticAuthResolver {
    async fn resolve_auth(&self, request: AuthRequest) -> Result<ResolvedAuth, AppError> {
        let credential = self.credentials.get(&request.credential_id).ok_or_else(|| {
            AppError::new(
                ErrorCategory::AuthenticationError,
                format!("unknown credential '{}'", request.credential_id),
            )
        })?;
        if let Some(provider) = &credential.provider {
            if provider != &request.provider_id {
                return Err(AppError::new(
                    ErrorCategory::AuthenticationError,
                    format!(
                        "credential '{}' belongs to provider '{}', not '{}'",
                        request.credential_id, provider, request.provider_id
                    ),
                ));
            }
        }
        tracing::debug!(
            provider = %request.provider_id,
            credential = %request.credential_id,
            user = %request.context.user_id,
            "resolved stored credential"
        );
        Ok(credential.resolve())
    }
}
