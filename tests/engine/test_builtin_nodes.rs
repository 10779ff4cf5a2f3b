use flowent::core::config::EngineConfig;
use flowent::core::engine::builtins::aggregate::aggregate;
use flowent::core::engine::{ExecutionContext, GenericProviderExecutor, NodeConfig};
use flowent::core::types::codes;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn executor() -> GenericProviderExecutor {
    GenericProviderExecutor::builder().build()
}

fn context() -> ExecutionContext {
    ExecutionContext::new("exec-1", "wf-1", "user-1", "node-1")
        .with_variable("status", json!("open"))
        .with_variable("amount", json!(250))
}

fn node(node_type: &str, values: Value) -> NodeConfig {
    let mut node = NodeConfig::new(node_type);
    if let Value::Object(map) = values {
        node.values = map;
    }
    node
}

#[tokio::test]
async fn test_set_variable_then_read_in_later_call() {
    let executor = executor();

    let first = executor
        .execute(&node("set_variable", json!({"name": "x", "value": 42})), context())
        .await;
    assert!(first.result.is_success());
    assert_eq!(first.result.data(), Some(&json!({"name": "x", "value": 42})));
    assert_eq!(first.context.variable("x"), Some(&json!(42)));

    let second = executor
        .execute(
            &node("transform", json!({"input": {"read": "{{ $variables.x }}"}})),
            first.context.for_node("node-2"),
        )
        .await;
    assert_eq!(second.result.data(), Some(&json!({"read": "42"})));
}

#[tokio::test]
async fn test_set_variable_requires_name() {
    let run = executor()
        .execute(&node("set_variable", json!({"name": "  ", "value": 1})), context())
        .await;
    let error = run.result.error().unwrap();
    assert_eq!(error.code.as_deref(), Some(codes::VALIDATION_ERROR));
    assert_eq!(run.context, context());
}

#[tokio::test]
async fn test_if_reports_branch() {
    let executor = executor();
    let conditions = json!([
        {"field": "status", "operator": "equals", "value": "open"},
        {"field": "amount", "operator": "greaterThan", "value": 500}
    ]);

    let all = executor
        .execute(&node("if", json!({"conditions": conditions.clone()})), context())
        .await;
    assert_eq!(all.result.data(), Some(&json!({"result": false, "branch": "false"})));

    let any = executor
        .execute(
            &node("if", json!({"conditions": conditions, "combinator": "or"})),
            context(),
        )
        .await;
    assert_eq!(any.result.data(), Some(&json!({"result": true, "branch": "true"})));
}

#[tokio::test]
async fn test_switch_matches_structurally_and_falls_back() {
    let executor = executor();
    let cases = json!([
        {"value": {"tier": "gold"}, "output": "vip"},
        {"value": "open", "output": "triage"}
    ]);

    let matched = executor
        .execute(
            &node("switch", json!({"value": {"tier": "gold"}, "cases": cases.clone()})),
            context(),
        )
        .await;
    assert_eq!(matched.result.data().unwrap()["output"], json!("vip"));
    assert_eq!(matched.result.data().unwrap()["matched"], json!(true));

    let templated = executor
        .execute(
            &node("switch", json!({"value": "{{ $variables.status }}", "cases": cases.clone()})),
            context(),
        )
        .await;
    assert_eq!(templated.result.data().unwrap()["output"], json!("triage"));

    let fallback = executor
        .execute(
            &node("switch", json!({"value": "closed", "cases": cases, "default": "archive"})),
            context(),
        )
        .await;
    assert_eq!(fallback.result.data().unwrap()["output"], json!("archive"));
    assert_eq!(fallback.result.data().unwrap()["matched"], json!(false));
}

#[tokio::test]
async fn test_loop_caps_items() {
    let run = executor()
        .execute(
            &node("loop", json!({"items": [1, 2, 3, 4, 5], "maxIterations": 2})),
            context(),
        )
        .await;
    assert_eq!(
        run.result.data(),
        Some(&json!({"items": [1, 2], "total": 5, "processed": 2}))
    );
}

#[tokio::test]
async fn test_loop_rejects_non_array_items() {
    let run = executor()
        .execute(&node("loop", json!({"items": "not-a-list"})), context())
        .await;
    let error = run.result.error().unwrap();
    assert!(error.message.contains("array"));
    assert_eq!(error.code.as_deref(), Some(codes::VALIDATION_ERROR));
}

#[tokio::test]
async fn test_filter_keeps_items_matching_all_conditions() {
    let run = executor()
        .execute(
            &node(
                "filter",
                json!({
                    "items": [
                        {"name": "a", "score": 10, "active": true},
                        {"name": "b", "score": 80, "active": true},
                        {"name": "c", "score": 90, "active": false}
                    ],
                    "conditions": [
                        {"field": "score", "operator": ">=", "value": 50},
                        {"field": "active", "operator": "===", "value": true}
                    ]
                }),
            ),
            context(),
        )
        .await;
    let data = run.result.data().unwrap();
    assert_eq!(data["items"], json!([{"name": "b", "score": 80, "active": true}]));
    assert_eq!(data["originalCount"], json!(3));
    assert_eq!(data["filteredCount"], json!(1));
}

#[tokio::test]
async fn test_transform_mappings() {
    let run = executor()
        .execute(
            &node(
                "transform",
                json!({
                    "input": {"first": " ada ", "meta": {"visits": "12"}},
                    "mappings": [
                        {"source": "first", "target": "person.name", "transform": "trim"},
                        {"source": "first", "target": "person.shout", "transform": "toUpperCase"},
                        {"source": "meta.visits", "target": "visits", "transform": "toNumber"},
                        {"source": "meta", "target": "raw", "transform": "stringify"}
                    ]
                }),
            ),
            context(),
        )
        .await;
    assert_eq!(
        run.result.data(),
        Some(&json!({
            "person": {"name": "ada", "shout": " ADA "},
            "visits": 12,
            "raw": "{\"visits\":\"12\"}"
        }))
    );
}

#[tokio::test]
async fn test_aggregate_operations() {
    let run = executor()
        .execute(
            &node(
                "aggregate",
                json!({"items": [{"v": 1}, {"v": 2}, {"v": 3}], "operation": "sum", "field": "v"}),
            ),
            context(),
        )
        .await;
    assert_eq!(run.result.data().unwrap()["result"], json!(6));

    assert_eq!(aggregate(&[], "count").unwrap(), json!(0));
    assert_eq!(aggregate(&[json!(3), json!(1), json!(2)], "max").unwrap(), json!(3));
    assert_eq!(aggregate(&[json!("x"), json!(4)], "sum").unwrap(), json!(4));
    assert_eq!(aggregate(&[json!("a"), json!("b")], "last").unwrap(), json!("b"));

    let unknown = executor()
        .execute(
            &node("aggregate", json!({"items": [1], "operation": "median"})),
            context(),
        )
        .await;
    assert_eq!(
        unknown.result.error().unwrap().code.as_deref(),
        Some(codes::UNKNOWN_OPERATION)
    );
}

#[tokio::test]
async fn test_wait_is_capped() {
    let mut config = EngineConfig::default();
    config.builtins.wait_cap_ms = 30;
    let executor = GenericProviderExecutor::builder().config(config).build();

    let started = Instant::now();
    let run = executor
        .execute(&node("wait", json!({"duration": 60_000})), context())
        .await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(run.result.data(), Some(&json!({"waited": 30})));
}

#[tokio::test]
async fn test_wait_honours_cancellation() {
    let executor = executor();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let run = executor
        .execute_with_cancellation(&node("wait", json!({"duration": 10_000})), context(), &cancel)
        .await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(run.result.error().unwrap().code.as_deref(), Some(codes::CANCELLED));
}

#[tokio::test]
async fn test_http_request_passthrough() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/in"))
        .and(query_param("source", "flowent"))
        .and(header("x-trace", "wf-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"accepted": true}})))
        .expect(1)
        .mount(&server)
        .await;

    let run = executor()
        .execute(
            &node(
                "http_request",
                json!({
                    "method": "POST",
                    "url": format!("{}/hooks/in", server.uri()),
                    "query": {"source": "flowent"},
                    "headers": {"X-Trace": "{{ $variables.workflow }}"},
                    "body": {"amount": "{{ $variables.amount }}"}
                }),
            ),
            context().with_variable("workflow", json!("wf-1")),
        )
        .await;

    assert!(run.result.is_success());
    // No data path on the passthrough profile: the whole body comes back.
    assert_eq!(run.result.data(), Some(&json!({"data": {"accepted": true}})));
    assert_eq!(run.result.meta.node_type.as_deref(), Some("http_request"));
    assert_eq!(run.result.meta.provider.as_deref(), Some("http"));
}

#[tokio::test]
async fn test_http_request_requires_url() {
    let run = executor()
        .execute(&node("http_request", json!({"method": "GET"})), context())
        .await;
    let error = run.result.error().unwrap();
    assert!(error.message.contains("url"));
    assert_eq!(run.result.meta.attempt, 1);
}
