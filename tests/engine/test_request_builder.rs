use flowent::core::engine::auth::{
    AuthContext, AuthRequest, CredentialKind, StoredCredential,
};
use flowent::core::engine::request::{RequestBody, RequestBuilder, REDACTED};
use flowent::core::engine::schema::{FieldDescriptor, FieldRole};
use flowent::core::engine::{
    AuthResolver, ExecutionContext, NodeDefinition, ProviderConfig, ResolvedAuth,
    StaticAuthResolver, StaticCatalog,
};
use flowent::core::types::codes;
use indexmap::IndexMap;
use reqwest::Method;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

fn provider() -> ProviderConfig {
    ProviderConfig::new("crm", "https://{instance}.crm.test/api/v2")
        .with_default_header("Accept", "application/json")
        .with_data_path("data")
}

fn catalog() -> StaticCatalog {
    StaticCatalog::with_builtins()
        .with_provider(provider())
        .with_operation("crm:contacts:get", "/contacts/{contactId}")
}

fn contact_create() -> NodeDefinition {
    NodeDefinition::new("crm_contact_create", "crm")
        .with_provider("crm")
        .with_operation("contacts", "create")
        .with_field(FieldDescriptor::body("email"))
        .with_field(FieldDescriptor::body("name"))
        .with_field(FieldDescriptor::with_role("trace", FieldRole::Header))
}

fn values(raw: Value) -> Map<String, Value> {
    match raw {
        Value::Object(map) => map,
        _ => panic!("test values must be an object"),
    }
}

fn acme_auth() -> ResolvedAuth {
    let mut auth = ResolvedAuth::default();
    auth.headers
        .insert("Authorization".to_string(), "Bearer secret-token".to_string());
    auth.url_params
        .insert("instance".to_string(), "acme".to_string());
    auth
}

fn query_of(url: &url::Url) -> HashMap<String, String> {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[test]
fn test_create_node_builds_post_with_synthesized_body() {
    let catalog = catalog();
    let resolver = StaticAuthResolver::new();
    let builder = RequestBuilder::new(&catalog, &resolver);

    let request = builder
        .build(
            &contact_create(),
            &provider(),
            &values(json!({"email": "ada@example.com", "name": "Ada", "trace": "t-7", "unused": 1})),
            &acme_auth(),
        )
        .unwrap();

    assert_eq!(request.method, Method::POST);
    assert_eq!(request.url.as_str(), "https://acme.crm.test/api/v2/contacts");
    assert_eq!(
        request.body,
        Some(RequestBody::Json(json!({"email": "ada@example.com", "name": "Ada"})))
    );
    assert_eq!(request.header("accept"), Some("application/json"));
    assert_eq!(request.header("authorization"), Some("Bearer secret-token"));
    assert_eq!(request.header("trace"), Some("t-7"));
}

#[test]
fn test_operation_template_and_query_fields() {
    let catalog = catalog();
    let resolver = StaticAuthResolver::new();
    let definition = NodeDefinition::new("crm_contact_get", "crm")
        .with_provider("crm")
        .with_operation("contacts", "get")
        .with_field(FieldDescriptor::with_role("contactId", FieldRole::Path))
        .with_field(FieldDescriptor::with_role("includeArchived", FieldRole::Query));

    let request = RequestBuilder::new(&catalog, &resolver)
        .build(
            &definition,
            &provider(),
            &values(json!({"contactId": "c 1", "includeArchived": true})),
            &acme_auth(),
        )
        .unwrap();

    assert_eq!(request.method, Method::GET);
    assert_eq!(request.url.path(), "/api/v2/contacts/c%201");
    assert_eq!(query_of(&request.url).get("includeArchived"), Some(&"true".to_string()));
    assert!(request.body.is_none());
}

#[test]
fn test_explicit_fields_take_precedence() {
    let catalog = catalog();
    let resolver = StaticAuthResolver::new();

    let request = RequestBuilder::new(&catalog, &resolver)
        .build(
            &contact_create(),
            &provider(),
            &values(json!({
                "method": "put",
                "endpoint": "/contacts/{id}/merge",
                "id": 42,
                "headers": {"accept": "text/plain"},
                "body": "raw payload"
            })),
            &acme_auth(),
        )
        .unwrap();

    assert_eq!(request.method, Method::PUT);
    assert_eq!(request.url.path(), "/api/v2/contacts/42/merge");
    assert_eq!(request.header("Accept"), Some("text/plain"));
    assert_eq!(request.headers.len(), 2);
    assert_eq!(request.body, Some(RequestBody::Text("raw payload".to_string())));
}

#[test]
fn test_get_moves_synthesized_fields_to_query() {
    let catalog = catalog();
    let resolver = StaticAuthResolver::new();
    let definition = NodeDefinition::new("crm_contact_search", "crm")
        .with_provider("crm")
        .with_operation("contacts", "search");

    let request = RequestBuilder::new(&catalog, &resolver)
        .build(
            &definition,
            &provider(),
            &values(json!({"q": "ada", "limit": 10})),
            &acme_auth(),
        )
        .unwrap();

    assert_eq!(request.method, Method::GET);
    assert_eq!(request.url.path(), "/api/v2/contacts");
    let query = query_of(&request.url);
    assert_eq!(query.get("q"), Some(&"ada".to_string()));
    assert_eq!(query.get("limit"), Some(&"10".to_string()));
    assert!(request.body.is_none());
}

#[test]
fn test_resource_fallback_with_id() {
    let catalog = catalog();
    let resolver = StaticAuthResolver::new();
    let definition = NodeDefinition::new("crm_deal_delete", "crm")
        .with_provider("crm")
        .with_operation("deals", "delete");

    let request = RequestBuilder::new(&catalog, &resolver)
        .build(&definition, &provider(), &values(json!({"id": "d-1"})), &acme_auth())
        .unwrap();

    assert_eq!(request.method, Method::DELETE);
    assert_eq!(request.url.as_str(), "https://acme.crm.test/api/v2/deals/d-1");
    assert!(request.body.is_none());
}

#[test]
fn test_missing_endpoint_information_is_rejected() {
    let catalog = catalog();
    let resolver = StaticAuthResolver::new();
    let definition = NodeDefinition::new("crm_misc_ping", "crm").with_provider("crm");

    let err = RequestBuilder::new(&catalog, &resolver)
        .build(&definition, &provider(), &Map::new(), &acme_auth())
        .unwrap_err();
    assert_eq!(err.code, codes::VALIDATION_ERROR);
}

#[test]
fn test_required_field_must_be_present_and_non_blank() {
    let catalog = catalog();
    let resolver = StaticAuthResolver::new();
    let definition = NodeDefinition::new("crm_contact_create", "crm")
        .with_provider("crm")
        .with_operation("contacts", "create")
        .with_field(FieldDescriptor::body("email").required())
        .with_field(FieldDescriptor::body("name"));
    let builder = RequestBuilder::new(&catalog, &resolver);

    for raw in [json!({"name": "Ada"}), json!({"email": null}), json!({"email": "  "})] {
        let err = builder
            .build(&definition, &provider(), &values(raw), &acme_auth())
            .unwrap_err();
        assert_eq!(err.code, codes::VALIDATION_ERROR);
        assert!(err.message.contains("email"), "{}", err.message);
    }

    let request = builder
        .build(&definition, &provider(), &values(json!({"email": "a@b.c"})), &acme_auth())
        .unwrap();
    assert_eq!(request.method, Method::POST);
}

#[test]
fn test_missing_base_url_parameter_is_a_config_error() {
    let catalog = catalog();
    let resolver = StaticAuthResolver::new();

    let err = RequestBuilder::new(&catalog, &resolver)
        .build(
            &contact_create(),
            &provider(),
            &values(json!({"email": "a@b.c"})),
            &ResolvedAuth::default(),
        )
        .unwrap_err();
    assert_eq!(err.code, codes::CONFIG_ERROR);
}

#[test]
fn test_node_url_params_override_credential_params() {
    let catalog = catalog();
    let resolver = StaticAuthResolver::new();

    let request = RequestBuilder::new(&catalog, &resolver)
        .build(
            &contact_create(),
            &provider(),
            &values(json!({"email": "a@b.c", "urlParams": {"instance": "sandbox"}})),
            &acme_auth(),
        )
        .unwrap();
    assert_eq!(request.url.host_str(), Some("sandbox.crm.test"));
}

#[tokio::test]
async fn test_query_credentials_are_sent_but_redacted_in_snapshot() {
    let resolver = StaticAuthResolver::new().with_credential(
        "crm-key",
        StoredCredential::new(CredentialKind::ApiKeyQuery {
            param: "api_key".into(),
            key: "k-123".into(),
        })
        .for_provider("crm")
        .with_url_param("instance", "acme"),
    );
    let auth = resolver
        .resolve_auth(AuthRequest {
            provider_id: "crm".into(),
            credential_id: "crm-key".into(),
            context: AuthContext::from_execution(&ExecutionContext::new("e", "w", "u", "n")),
            url_params: IndexMap::new(),
        })
        .await
        .unwrap();

    let catalog = catalog();
    let request = RequestBuilder::new(&catalog, &resolver)
        .build(
            &contact_create(),
            &provider(),
            &values(json!({"email": "a@b.c"})),
            &auth,
        )
        .unwrap();

    assert_eq!(query_of(&request.url).get("api_key"), Some(&"k-123".to_string()));
    let snapshot = request.snapshot();
    assert!(snapshot.url.contains(&format!("api_key={}", urlencode(REDACTED))));
    assert!(!snapshot.url.contains("k-123"));
}

#[tokio::test]
async fn test_credentials_for_other_providers_are_refused() {
    let resolver = StaticAuthResolver::new().with_credential(
        "mail-token",
        StoredCredential::new(CredentialKind::Bearer {
            token: "t".into(),
        })
        .for_provider("mail"),
    );
    let err = resolver
        .resolve_auth(AuthRequest {
            provider_id: "crm".into(),
            credential_id: "mail-token".into(),
            context: AuthContext::from_execution(&ExecutionContext::new("e", "w", "u", "n")),
            url_params: IndexMap::new(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code, codes::AUTH_FAILED);
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
