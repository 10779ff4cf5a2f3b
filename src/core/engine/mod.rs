//! Node execution engine: template resolution, request building, HTTP
//! execution with retry, and the built-in node interpreter.

pub mod auth;
pub mod builtins;
pub mod condition;
pub mod context;
pub mod executor;
pub mod http;
pub mod path;
pub mod recorder;
pub mod registry;
pub mod request;
pub mod result;
pub mod retry;
pub mod sandbox;
pub mod schema;
pub mod template;
pub mod value;

pub use auth::{AuthResolver, NoAuth, ResolvedAuth, StaticAuthResolver};
pub use builtins::BuiltinNode;
pub use context::ExecutionContext;
pub use executor::{ExecutorBuilder, GenericProviderExecutor, NodeRun};
pub use http::HttpExecutor;
pub use recorder::{JsonlStepRecorder, StepRecord, StepRecorder};
pub use registry::{NodeRegistry, ProviderRegistry, StaticCatalog};
pub use result::{ExecutionError, ExecutionMeta, ExecutionResult};
pub use schema::{NodeConfig, NodeDefinition, ProviderConfig, RetryPolicy};
pub use template::TemplateResolver;
