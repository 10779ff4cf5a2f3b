use flowent::core::config::{EngineConfig, SandboxConfig};
use flowent::core::engine::sandbox::{ScriptBindings, ScriptSandbox};
use flowent::core::engine::{ExecutionContext, GenericProviderExecutor, NodeConfig};
use flowent::core::types::codes;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn context() -> ExecutionContext {
    ExecutionContext::new("exec-1", "wf-1", "user-1", "node-3")
        .with_variable("discount", json!(10))
        .with_output("node-1", json!({"total": 90}))
}

fn code_node(script: &str) -> NodeConfig {
    NodeConfig::new("code").with_value("code", json!(script))
}

fn tight_sandbox(timeout_ms: u64) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.sandbox.timeout_ms = timeout_ms;
    config.sandbox.max_operations = 0;
    config
}

#[tokio::test]
async fn test_code_node_reads_bindings() {
    let node = code_node(
        r#"
        let total = outputs["node-1"].total;
        #{ net: total - variables.discount, label: input.label, count: input.items.len() }
        "#,
    )
    .with_value("input", json!({"label": "order", "items": [1, 2, 3]}));

    let run = GenericProviderExecutor::builder()
        .build()
        .execute(&node, context())
        .await;

    assert!(run.result.is_success(), "{:?}", run.result.error());
    assert_eq!(
        run.result.data(),
        Some(&json!({"net": 80, "label": "order", "count": 3}))
    );
}

#[tokio::test]
async fn test_code_node_returns_scalars_and_arrays() {
    let executor = GenericProviderExecutor::builder().build();

    let text = executor.execute(&code_node(r#""a" + "b""#), context()).await;
    assert_eq!(text.result.data(), Some(&json!("ab")));

    let list = executor
        .execute(&code_node("[1, 2.5, true, ()]"), context())
        .await;
    assert_eq!(list.result.data(), Some(&json!([1, 2.5, true, null])));
}

#[tokio::test]
async fn test_code_node_requires_script() {
    let run = GenericProviderExecutor::builder()
        .build()
        .execute(&code_node("   "), context())
        .await;
    assert_eq!(
        run.result.error().unwrap().code.as_deref(),
        Some(codes::VALIDATION_ERROR)
    );
}

#[tokio::test]
async fn test_thrown_error_becomes_script_error() {
    let run = GenericProviderExecutor::builder()
        .build()
        .execute(&code_node(r#"throw "discount too large""#), context())
        .await;
    let error = run.result.error().unwrap();
    assert_eq!(error.code.as_deref(), Some(codes::SCRIPT_ERROR));
    assert!(error.message.contains("discount too large"));
}

#[tokio::test]
async fn test_syntax_error_becomes_script_error() {
    let run = GenericProviderExecutor::builder()
        .build()
        .execute(&code_node("let = ;"), context())
        .await;
    assert_eq!(
        run.result.error().unwrap().code.as_deref(),
        Some(codes::SCRIPT_ERROR)
    );
}

#[tokio::test]
async fn test_runaway_script_times_out() {
    let executor = GenericProviderExecutor::builder()
        .config(tight_sandbox(100))
        .build();

    let started = Instant::now();
    let run = executor
        .execute(&code_node("let x = 0; loop { x += 1; }"), context())
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(run.result.error().unwrap().code.as_deref(), Some(codes::TIMEOUT));
}

#[tokio::test]
async fn test_operation_budget_is_enforced() {
    let mut config = SandboxConfig::default();
    config.max_operations = 1_000;
    let sandbox = ScriptSandbox::new(config);

    let err = sandbox
        .run(
            "let x = 0; loop { x += 1; }",
            ScriptBindings::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, codes::SCRIPT_ERROR);
}

#[tokio::test]
async fn test_no_host_access_functions() {
    let sandbox = ScriptSandbox::new(SandboxConfig::default());

    for script in [r#"open_file("/etc/passwd")"#, r#"import "os" as os; 1"#] {
        let err = sandbox
            .run(script, ScriptBindings::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::SCRIPT_ERROR, "script {script} should fail");
    }
}

#[tokio::test]
async fn test_cancellation_stops_script() {
    let mut config = SandboxConfig::default();
    config.timeout_ms = 10_000;
    config.max_operations = 0;
    let sandbox = ScriptSandbox::new(config);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = sandbox
        .run("let x = 0; loop { x += 1; }", ScriptBindings::default(), &cancel)
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(err.code, codes::CANCELLED);
}
