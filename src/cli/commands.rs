use crate::{
    cli::args::{NodesArgs, RunArgs, ValidateArgs},
    core::{
        engine::{
            ExecutionContext, GenericProviderExecutor, NodeConfig, StaticAuthResolver,
            StaticCatalog, TemplateResolver,
        },
        ConfigLoader,
    },
    Result,
};
use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{env, fs, path::Path, sync::Arc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Execute a single node and print the result envelope as JSON.
pub async fn run(args: RunArgs) -> Result<bool> {
    let workspace = match &args.workspace {
        Some(path) => path.clone(),
        None => env::current_dir().context("failed to resolve current directory")?,
    };
    let config = ConfigLoader::load_from_workspace(&workspace)?;
    let catalog = match &args.catalog {
        Some(path) => StaticCatalog::load(path)?,
        None => StaticCatalog::with_builtins(),
    };
    let node: NodeConfig = read_document(&args.node)?;
    let context = match &args.context {
        Some(path) => read_document(path)?,
        None => ExecutionContext::new(Uuid::new_v4().to_string(), "cli", "cli", "cli"),
    };

    let mut builder = GenericProviderExecutor::builder()
        .catalog(Arc::new(catalog))
        .config(config);
    if let Some(path) = &args.credentials {
        builder = builder.auth_resolver(Arc::new(StaticAuthResolver::from_yaml_file(path)?));
    }
    let executor = builder.build();

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling node");
                cancel.cancel();
            }
        })
    };
    let outcome = executor
        .execute_with_cancellation(&node, context, &cancel)
        .await;
    interrupt.abort();

    println!("{}", serde_json::to_string_pretty(&outcome.result)?);
    if let Some(path) = &args.context_out {
        write_json(path, &outcome.context)?;
    }

    Ok(outcome.result.is_success())
}

/// List built-in and catalog node types.
pub fn nodes(args: NodesArgs) -> Result<bool> {
    let catalog = match &args.catalog {
        Some(path) => StaticCatalog::load(path)?,
        None => StaticCatalog::with_builtins(),
    };
    for definition in catalog.nodes() {
        println!(
            "{:<28} {:<12} {}",
            definition.node_type,
            definition.category,
            definition.provider.as_deref().unwrap_or("-")
        );
    }
    Ok(true)
}

/// Report template expressions that would be left unresolved.
pub fn validate(args: ValidateArgs) -> Result<bool> {
    let node: NodeConfig = read_document(&args.node)?;
    let unresolved = TemplateResolver::unresolved_expressions(&Value::Object(node.values));
    if unresolved.is_empty() {
        println!("{}: no unrecognized expressions", node.node_type);
        return Ok(true);
    }
    for expression in &unresolved {
        println!("{}: unrecognized expression {}", node.node_type, expression);
    }
    Ok(false)
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let parsed = if is_json {
        serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))?
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("invalid YAML in {}", path.display()))?
    };
    Ok(parsed)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
