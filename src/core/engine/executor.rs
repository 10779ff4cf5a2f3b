//! Public entry point: executes exactly one node and returns a uniform
//! result envelope together with the (possibly updated) context.

use crate::core::config::EngineConfig;
use crate::core::engine::auth::{AuthContext, AuthRequest, AuthResolver, NoAuth, ResolvedAuth};
use crate::core::engine::builtins::{BuiltinCall, BuiltinInterpreter, BuiltinNode};
use crate::core::engine::context::ExecutionContext;
use crate::core::engine::http::HttpExecutor;
use crate::core::engine::recorder::{JsonlStepRecorder, StepRecord, StepRecorder};
use crate::core::engine::registry::{string_params, NodeRegistry, ProviderRegistry, StaticCatalog};
use crate::core::engine::request::RequestBuilder;
use crate::core::engine::result::{ExecutionMeta, ExecutionResult};
use crate::core::engine::retry::execute_with_retry;
use crate::core::engine::sandbox::ScriptSandbox;
use crate::core::engine::schema::{NodeConfig, NodeDefinition, ProviderConfig, RetryPolicy};
use crate::core::engine::template::TemplateResolver;
use crate::core::error::AppError;
use crate::core::types::{codes, ErrorCategory};
use futures::FutureExt;
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Result of one node execution plus the context to use for the next node.
#[derive(Debug, Clone)]
pub struct NodeRun {
    pub result: ExecutionResult,
    pub context: ExecutionContext,
}

enum NodeKind {
    Builtin(BuiltinNode),
    Provider {
        definition: NodeDefinition,
        provider: ProviderConfig,
    },
}

type Assignment = Option<(String, Value)>;

pub struct GenericProviderExecutor {
    nodes: Arc<dyn NodeRegistry>,
    providers: Arc<dyn ProviderRegistry>,
    auth: Arc<dyn AuthResolver>,
    recorder: Option<Arc<dyn StepRecorder>>,
    config: EngineConfig,
    templates: TemplateResolver,
    http: HttpExecutor,
    builtins: BuiltinInterpreter,
}

impl GenericProviderExecutor {
    pub fn builder() -> ExecutorBuilder {
        ExecutorBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn execute(&self, node: &NodeConfig, ctx: ExecutionContext) -> NodeRun {
        self.execute_with_cancellation(node, ctx, &CancellationToken::new())
            .await
    }

    pub async fn execute_with_cancellation(
        &self,
        node: &NodeConfig,
        ctx: ExecutionContext,
        cancel: &CancellationToken,
    ) -> NodeRun {
        let started = Instant::now();
        let span = tracing::info_span!(
            "node",
            node_type = %node.node_type,
            node_id = %ctx.node_id,
            execution_id = %ctx.execution_id,
        );
        let guarded = AssertUnwindSafe(self.run_node(node, &ctx, cancel))
            .catch_unwind()
            .instrument(span)
            .await;
        let (mut result, assignment) = match guarded {
            Ok(outcome) => outcome,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                tracing::error!(node_type = %node.node_type, panic = %detail, "node execution panicked");
                let error = AppError::new(ErrorCategory::InternalError, "internal engine error");
                (ExecutionResult::failure(error), None)
            }
        };

        result.meta.duration_ms = started.elapsed().as_millis() as u64;
        result.meta.node_type = Some(node.node_type.clone());

        let mut context = ctx;
        if let Some((name, value)) = assignment {
            context.assign_variable(name, value);
        }

        tracing::info!(
            node_type = %node.node_type,
            node_id = %context.node_id,
            success = result.is_success(),
            duration_ms = result.meta.duration_ms,
            attempt = result.meta.attempt,
            code = result.error().and_then(|e| e.code.as_deref()).unwrap_or_default(),
            "node executed"
        );

        if let Some(recorder) = &self.recorder {
            let record = StepRecord::new(&context, &node.node_type, &result);
            if let Err(err) = recorder.record(&record).await {
                tracing::warn!(error = %err, "failed to record step");
            }
        }

        NodeRun { result, context }
    }

    async fn run_node(
        &self,
        node: &NodeConfig,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> (ExecutionResult, Assignment) {
        if cancel.is_cancelled() {
            return (ExecutionResult::failure(AppError::cancelled()), None);
        }

        let kind = match self.classify(node) {
            Ok(kind) => kind,
            Err(err) => return (ExecutionResult::failure(err), None),
        };
        let provider_id = match &kind {
            NodeKind::Provider { provider, .. } => Some(provider.id.as_str()),
            NodeKind::Builtin(_) => None,
        };

        let values = match self.templates.resolve_map(&node.values, ctx) {
            Ok(values) => values,
            Err(err) => return (failure_for(err, provider_id), None),
        };

        match kind {
            NodeKind::Builtin(builtin) => {
                let retry = self.retry_policy(node);
                let call = BuiltinCall {
                    values: &values,
                    ctx,
                    retry: &retry,
                    timeout_ms: node.timeout_ms,
                    cancel,
                };
                let run = self.builtins.execute(builtin, call).await;
                (run.result, run.assignment)
            }
            NodeKind::Provider {
                definition,
                provider,
            } => {
                let result = self
                    .call_provider(node, &definition, &provider, &values, ctx, cancel)
                    .await;
                (result, None)
            }
        }
    }

    fn classify(&self, node: &NodeConfig) -> Result<NodeKind, AppError> {
        let definition = self.nodes.node_by_id(&node.node_type).ok_or_else(|| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                format!("unknown node type '{}'", node.node_type),
            )
            .with_code(codes::UNKNOWN_NODE_TYPE)
        })?;

        if definition.is_builtin_category() {
            return BuiltinNode::from_type(&definition.node_type)
                .map(NodeKind::Builtin)
                .ok_or_else(|| {
                    AppError::new(
                        ErrorCategory::ConfigurationError,
                        format!("no built-in implementation for '{}'", definition.node_type),
                    )
                    .with_code(codes::UNKNOWN_NODE_TYPE)
                });
        }

        let provider = definition
            .provider
            .as_deref()
            .and_then(|id| self.providers.provider_config(id))
            .ok_or_else(|| {
                AppError::new(
                    ErrorCategory::ConfigurationError,
                    format!(
                        "no provider config for node type '{}' (provider '{}')",
                        definition.node_type,
                        definition.provider.as_deref().unwrap_or("<none>")
                    ),
                )
                .with_code(codes::PROVIDER_CONFIG_MISSING)
            })?;

        Ok(NodeKind::Provider {
            definition,
            provider,
        })
    }

    async fn call_provider(
        &self,
        node: &NodeConfig,
        definition: &NodeDefinition,
        provider: &ProviderConfig,
        values: &Map<String, Value>,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        let auth = match &node.credential_id {
            Some(credential_id) => {
                let request = AuthRequest {
                    provider_id: provider.id.clone(),
                    credential_id: credential_id.clone(),
                    context: AuthContext::from_execution(ctx),
                    url_params: string_params(values.get("urlParams")),
                };
                match self.auth.resolve_auth(request).await {
                    Ok(auth) => auth,
                    Err(err) => return failure_for(err, Some(&provider.id)),
                }
            }
            None => ResolvedAuth::default(),
        };

        let builder = RequestBuilder::new(self.providers.as_ref(), self.auth.as_ref());
        let request = match builder.build(definition, provider, values, &auth) {
            Ok(request) => request,
            Err(err) => return failure_for(err, Some(&provider.id)),
        };

        let policy = self.retry_policy(node);
        execute_with_retry(&policy, cancel, |attempt| {
            self.http
                .execute(&request, provider, node.timeout_ms, attempt)
        })
        .await
    }

    fn retry_policy(&self, node: &NodeConfig) -> RetryPolicy {
        node.retry
            .clone()
            .unwrap_or_else(|| self.config.retry.policy())
    }
}

fn failure_for(error: AppError, provider_id: Option<&str>) -> ExecutionResult {
    ExecutionResult::failure(error).with_meta(ExecutionMeta {
        provider: provider_id.map(str::to_string),
        attempt: 1,
        ..Default::default()
    })
}

/// Wires collaborators into a [`GenericProviderExecutor`].
#[derive(Default)]
pub struct ExecutorBuilder {
    nodes: Option<Arc<dyn NodeRegistry>>,
    providers: Option<Arc<dyn ProviderRegistry>>,
    auth: Option<Arc<dyn AuthResolver>>,
    recorder: Option<Arc<dyn StepRecorder>>,
    config: EngineConfig,
    http_client: Option<reqwest::Client>,
}

impl ExecutorBuilder {
    /// Use one catalog for both node and provider lookups.
    pub fn catalog(mut self, catalog: Arc<StaticCatalog>) -> Self {
        self.nodes = Some(catalog.clone());
        self.providers = Some(catalog);
        self
    }

    pub fn node_registry(mut self, nodes: Arc<dyn NodeRegistry>) -> Self {
        self.nodes = Some(nodes);
        self
    }

    pub fn provider_registry(mut self, providers: Arc<dyn ProviderRegistry>) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn auth_resolver(mut self, auth: Arc<dyn AuthResolver>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn recorder(mut self, recorder: Arc<dyn StepRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn build(self) -> GenericProviderExecutor {
        let config = self.config;
        let catalog = Arc::new(StaticCatalog::with_builtins());
        let http = match self.http_client {
            Some(client) => HttpExecutor::new(client, config.http.timeout_ms),
            None => HttpExecutor::with_user_agent(&config.http.user_agent, config.http.timeout_ms),
        };
        let recorder = self.recorder.or_else(|| {
            config
                .recorder
                .path
                .as_ref()
                .map(|path| Arc::new(JsonlStepRecorder::new(path.clone())) as Arc<dyn StepRecorder>)
        });
        let builtins = BuiltinInterpreter::new(
            config.builtins.clone(),
            ScriptSandbox::new(config.sandbox.clone()),
            http.clone(),
        );

        GenericProviderExecutor {
            nodes: self
                .nodes
                .unwrap_or_else(|| catalog.clone() as Arc<dyn NodeRegistry>),
            providers: self.providers.unwrap_or(catalog),
            auth: self.auth.unwrap_or_else(|| Arc::new(NoAuth)),
            recorder,
            templates: TemplateResolver::new(config.templates.strict),
            http,
            builtins,
            config,
        }
    }
}
