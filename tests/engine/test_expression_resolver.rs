use flowent::core::engine::condition::{evaluate, Combinator, Condition};
use flowent::core::engine::path::{get_path, set_path, PathError};
use flowent::core::engine::template::resolve_value;
use flowent::core::engine::{ExecutionContext, TemplateResolver};
use flowent::core::types::codes;
use serde_json::{json, Value};
use serial_test::serial;
use std::env;

fn context() -> ExecutionContext {
    ExecutionContext::new("exec-1", "wf-1", "user-1", "node-3")
        .with_variable("a", json!({"b": 5}))
        .with_variable("customer", json!({"email": "ada@example.com", "tags": ["vip"]}))
        .with_output("lookup", json!({"contact": {"id": "c-9"}, "count": 2}))
}

#[test]
fn test_variable_paths_resolve_to_strings() {
    let ctx = context();
    assert_eq!(resolve_value(&json!("{{ $variables.a.b }}"), &ctx), json!("5"));
    assert_eq!(
        resolve_value(&json!("mailto:{{$variables.customer.email}}"), &ctx),
        json!("mailto:ada@example.com")
    );
    assert_eq!(
        resolve_value(&json!("{{ $variables.customer.tags }}"), &ctx),
        json!(r#"["vip"]"#)
    );
}

#[test]
fn test_unknown_paths_resolve_to_empty_string() {
    assert_eq!(resolve_value(&json!("{{ $variables.x.y }}"), &context()), json!(""));
    assert_eq!(resolve_value(&json!("{{ $outputs.missing.id }}"), &context()), json!(""));
}

#[test]
fn test_unrecognized_forms_are_left_verbatim() {
    assert_eq!(
        resolve_value(&json!("{{ $unknown.foo }}"), &context()),
        json!("{{ $unknown.foo }}")
    );
}

#[test]
fn test_outputs_with_and_without_path() {
    let ctx = context();
    assert_eq!(resolve_value(&json!("{{ $outputs.lookup.contact.id }}"), &ctx), json!("c-9"));
    assert_eq!(
        resolve_value(&json!("{{ $outputs.lookup }}"), &ctx),
        json!(r#"{"contact":{"id":"c-9"},"count":2}"#)
    );
}

#[test]
#[serial]
fn test_env_expressions() {
    env::set_var("FLOWENT_TEST_REGION", "eu-west-1");
    let resolved = resolve_value(&json!("https://{{ $env.FLOWENT_TEST_REGION }}.api.test"), &context());
    env::remove_var("FLOWENT_TEST_REGION");
    assert_eq!(resolved, json!("https://eu-west-1.api.test"));
}

#[test]
fn test_trees_are_walked_structurally() {
    let ctx = context();
    let input = json!({
        "email": "{{ $variables.customer.email }}",
        "count": 3,
        "flags": [true, null, "{{ $variables.a.b }}"],
        "nested": {"id": "{{ $outputs.lookup.contact.id }}"}
    });
    let resolved = resolve_value(&input, &ctx);
    assert_eq!(
        resolved,
        json!({
            "email": "ada@example.com",
            "count": 3,
            "flags": [true, null, "5"],
            "nested": {"id": "c-9"}
        })
    );
}

#[test]
fn test_resolution_is_idempotent_on_resolved_trees() {
    let ctx = context();
    let resolved = json!({"a": "plain text", "b": [1, 2.5, false], "c": {"d": null}});
    assert_eq!(resolve_value(&resolved, &ctx), resolved);

    let once = resolve_value(&json!({"x": "{{ $variables.a.b }}"}), &ctx);
    assert_eq!(resolve_value(&once, &ctx), once);
}

#[test]
fn test_strict_mode_fails_on_unrecognized_expressions() {
    let strict = TemplateResolver::new(true);
    let err = strict
        .resolve(&json!({"subject": "Hi {{ name }}"}), &context())
        .unwrap_err();
    assert_eq!(err.code, codes::TEMPLATE_UNRESOLVED);

    let ok = strict.resolve(&json!("{{ $variables.a.b }}"), &context()).unwrap();
    assert_eq!(ok, json!("5"));
}

#[test]
fn test_condition_truth_table() {
    assert!(evaluate(&json!(5), "greaterThan", &json!(3)));
    assert!(evaluate(&json!(""), "isEmpty", &Value::Null));
    assert!(evaluate(&json!([]), "isEmpty", &Value::Null));
    assert!(evaluate(&json!("abc"), "regex", &json!("^a")));
    assert!(!evaluate(&json!("x"), "regex", &json!("(")));
    assert!(evaluate(&json!("5"), "equals", &json!(5)));
    assert!(!evaluate(&json!("5"), "strictEquals", &json!(5)));
    assert!(evaluate(&json!(["a", "b"]), "contains", &json!("b")));
    assert!(evaluate(&json!("hello"), "startsWith", &json!("he")));
    assert!(evaluate(&json!(2), "<=", &json!(2)));
    assert!(!evaluate(&json!(1), "between", &json!(2)));
}

#[test]
fn test_combinators() {
    let subject = json!({"status": "open", "amount": 120});
    let conditions: Vec<Condition> = serde_json::from_value(json!([
        {"field": "status", "operator": "equals", "value": "open"},
        {"field": "amount", "operator": "greaterThan", "value": 500}
    ]))
    .unwrap();

    assert!(!Combinator::And.combine(&conditions, &subject));
    assert!(Combinator::Or.combine(&conditions, &subject));
    assert!(Combinator::And.combine(&[], &subject));
    assert!(!Combinator::Or.combine(&[], &subject));
}

#[test]
fn test_path_get_and_set() {
    let mut root = json!({"items": [{"name": "first"}]});
    assert_eq!(get_path(&root, "items.0.name"), Some(&json!("first")));
    assert_eq!(get_path(&root, "items[0].name"), Some(&json!("first")));
    assert_eq!(get_path(&root, "items.5.name"), None);
    assert_eq!(get_path(&root, "items.0.name.deeper"), None);

    set_path(&mut root, "meta.source.kind", json!("api")).unwrap();
    assert_eq!(root["meta"]["source"]["kind"], json!("api"));

    let err = set_path(&mut root, "items.0.name.deeper", json!(1)).unwrap_err();
    assert!(matches!(err, PathError::TypeMismatch { .. }));
    assert_eq!(set_path(&mut root, "", json!(1)), Err(PathError::Empty));
}
