#![allow(clippy::result_large_err)]

//! Derives an outbound HTTP request from a node definition and its resolved
//! field values.

use crate::core::engine::auth::{AuthResolver, ResolvedAuth};
use crate::core::engine::registry::{string_params, ProviderRegistry};
use crate::core::engine::result::RequestSnapshot;
use crate::core::engine::schema::{FieldRole, NodeDefinition, ProviderConfig};
use crate::core::engine::value::to_text;
use crate::core::error::AppError;
use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Method;
use serde_json::{Map, Value};
use url::Url;

/// Field ids that steer request construction and never land in a body.
pub const RESERVED_FIELDS: [&str; 6] = ["body", "headers", "endpoint", "method", "query", "urlParams"];

pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_HEADERS: [&str; 3] = ["authorization", "x-api-key", "api-key"];
const SENSITIVE_QUERY: [&str; 5] = ["api_key", "apikey", "access_token", "token", "key"];

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Text(String),
    Form(Vec<(String, String)>),
}

impl RequestBody {
    pub fn to_value(&self) -> Value {
        match self {
            RequestBody::Json(value) => value.clone(),
            RequestBody::Text(text) => Value::String(text.clone()),
            RequestBody::Form(pairs) => Value::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: IndexMap<String, String>,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Diagnostic copy with credentials masked. The live request is untouched.
    pub fn snapshot(&self) -> RequestSnapshot {
        RequestSnapshot {
            method: self.method.to_string(),
            url: redacted_url(&self.url),
            headers: sanitize_headers(&self.headers),
            body: self.body.as_ref().map(RequestBody::to_value),
        }
    }
}

pub fn sanitize_headers(headers: &IndexMap<String, String>) -> IndexMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let lowered = name.to_ascii_lowercase();
            if SENSITIVE_HEADERS.contains(&lowered.as_str()) {
                (name.clone(), REDACTED.to_string())
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect()
}

pub fn redacted_url(url: &Url) -> String {
    if url.query().is_none() {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| {
            let lowered = name.to_ascii_lowercase();
            if SENSITIVE_QUERY.contains(&lowered.as_str()) {
                (name.into_owned(), REDACTED.to_string())
            } else {
                (name.into_owned(), value.into_owned())
            }
        })
        .collect();
    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

/// HTTP method implied by keywords in a node type such as `crm_contact_create`.
pub fn infer_method(node_type: &str) -> Method {
    let tokens = type_keywords(node_type);
    let has = |words: &[&str]| tokens.iter().any(|token| words.contains(&token.as_str()));

    if has(&["create", "send"]) {
        Method::POST
    } else if has(&["update", "edit"]) {
        Method::PATCH
    } else if has(&["delete", "remove"]) {
        Method::DELETE
    } else {
        Method::GET
    }
}

/// Required fields must be present and neither null nor blank.
fn check_required(
    definition: &NodeDefinition,
    values: &Map<String, Value>,
) -> Result<(), AppError> {
    for field in definition.fields.iter().filter(|field| field.required) {
        let missing = match values.get(&field.id) {
            None | Some(Value::Null) => true,
            Some(Value::String(text)) => text.trim().is_empty(),
            Some(_) => false,
        };
        if missing {
            return Err(AppError::validation(format!(
                "missing required field '{}' for {}",
                field.id, definition.node_type
            )));
        }
    }
    Ok(())
}

/// Lowercase words of a node type, split on separators and camelCase humps.
fn type_keywords(node_type: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in node_type.chars() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_ascii_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        current.push(c.to_ascii_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

pub fn explicit_method(values: &Map<String, Value>) -> Result<Option<Method>, AppError> {
    match values.get("method") {
        Some(Value::String(raw)) if !raw.trim().is_empty() => {
            Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
                .map(Some)
                .map_err(|_| AppError::validation(format!("invalid HTTP method '{}'", raw)))
        }
        _ => Ok(None),
    }
}

/// Replace `{name}` placeholders with percent-encoded field values. Returns
/// the expanded path and the field ids it consumed; unknown placeholders stay.
pub fn substitute_path_params(template: &str, values: &Map<String, Value>) -> (String, Vec<String>) {
    let mut output = String::with_capacity(template.len());
    let mut consumed = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let name = &rest[start + 1..start + len];
        output.push_str(&rest[..start]);
        match values.get(name).filter(|value| !value.is_null()) {
            Some(value) => {
                output.push_str(&utf8_percent_encode(&to_text(value), PATH_SEGMENT).to_string());
                consumed.push(name.to_string());
            }
            None => output.push_str(&rest[start..start + len + 1]),
        }
        rest = &rest[start + len + 1..];
    }
    output.push_str(rest);
    (output, consumed)
}

fn resolve_endpoint(
    definition: &NodeDefinition,
    values: &Map<String, Value>,
    providers: &dyn ProviderRegistry,
) -> Result<(String, Vec<String>), AppError> {
    if let Some(Value::String(endpoint)) = values.get("endpoint") {
        if !endpoint.is_empty() {
            return Ok(substitute_path_params(endpoint, values));
        }
    }
    if let Some(template) = definition
        .operation_key()
        .and_then(|key| providers.operation_endpoint(&key))
    {
        return Ok(substitute_path_params(&template, values));
    }
    let Some(resource) = definition.resource.as_deref() else {
        return Err(AppError::validation(format!(
            "cannot derive an endpoint for node type '{}'",
            definition.node_type
        )));
    };
    match values.get("id").filter(|id| !id.is_null() && !to_text(id).is_empty()) {
        Some(id) => Ok((
            format!(
                "/{}/{}",
                resource,
                utf8_percent_encode(&to_text(id), PATH_SEGMENT)
            ),
            vec!["id".to_string()],
        )),
        None => Ok((format!("/{}", resource), Vec::new())),
    }
}

fn role_values(
    definition: &NodeDefinition,
    values: &Map<String, Value>,
    role: FieldRole,
) -> IndexMap<String, String> {
    definition
        .fields
        .iter()
        .filter(|field| field.role == role)
        .filter_map(|field| {
            values
                .get(&field.id)
                .filter(|value| !value.is_null())
                .map(|value| (field.id.clone(), to_text(value)))
        })
        .collect()
}

fn synthesize_body(
    definition: &NodeDefinition,
    values: &Map<String, Value>,
    consumed: &[String],
) -> Map<String, Value> {
    let keep = |id: &str| !RESERVED_FIELDS.contains(&id) && !consumed.iter().any(|c| c == id);
    if definition.fields.is_empty() {
        return values
            .iter()
            .filter(|(id, value)| keep(id) && !value.is_null())
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect();
    }
    definition
        .fields
        .iter()
        .filter(|field| field.role == FieldRole::Body && keep(&field.id))
        .filter_map(|field| {
            values
                .get(&field.id)
                .filter(|value| !value.is_null())
                .map(|value| (field.id.clone(), value.clone()))
        })
        .collect()
}

fn is_empty_body(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn is_form_encoded(headers: &IndexMap<String, String>) -> bool {
    headers.iter().any(|(name, value)| {
        name.eq_ignore_ascii_case("content-type")
            && value
                .to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
    })
}

/// Encode a body value according to the outgoing content type.
pub fn encode_body(body: Value, headers: &IndexMap<String, String>) -> Option<RequestBody> {
    if is_empty_body(&body) {
        return None;
    }
    match body {
        Value::String(text) => Some(RequestBody::Text(text)),
        Value::Object(map) if is_form_encoded(headers) => Some(RequestBody::Form(
            map.iter().map(|(k, v)| (k.clone(), to_text(v))).collect(),
        )),
        other => Some(RequestBody::Json(other)),
    }
}

/// Parse a URL and append query parameters to it.
pub fn finalize_url<'a, I>(raw: &str, query: I) -> Result<Url, AppError>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut url = Url::parse(raw)
        .map_err(|e| AppError::validation(format!("invalid request URL '{}': {}", raw, e)))?;
    let mut pairs = query.into_iter().peekable();
    if pairs.peek().is_some() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(url)
}

/// Collaborators and inputs for one provider request.
pub struct RequestBuilder<'a> {
    pub providers: &'a dyn ProviderRegistry,
    pub auth_resolver: &'a dyn AuthResolver,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(providers: &'a dyn ProviderRegistry, auth_resolver: &'a dyn AuthResolver) -> Self {
        Self {
            providers,
            auth_resolver,
        }
    }

    pub fn build(
        &self,
        definition: &NodeDefinition,
        provider: &ProviderConfig,
        values: &Map<String, Value>,
        auth: &ResolvedAuth,
    ) -> Result<HttpRequest, AppError> {
        check_required(definition, values)?;

        let method = match explicit_method(values)? {
            Some(method) => method,
            None => infer_method(&definition.node_type),
        };

        let (endpoint, consumed) = resolve_endpoint(definition, values, self.providers)?;

        let mut url_params = string_params(values.get("urlParams"));
        url_params.extend(role_values(definition, values, FieldRole::UrlParam));
        let raw_url =
            self.auth_resolver
                .build_provider_url(provider, &endpoint, auth, &url_params)?;

        let mut custom_headers = string_params(values.get("headers"));
        custom_headers.extend(role_values(definition, values, FieldRole::Header));
        let headers =
            self.auth_resolver
                .merge_headers(auth, &custom_headers, &provider.default_headers);

        let mut query = auth.query.clone();
        query.extend(string_params(values.get("query")));
        query.extend(role_values(definition, values, FieldRole::Query));

        let body = match values.get("body").filter(|body| !body.is_null()) {
            Some(explicit) => encode_body(explicit.clone(), &headers),
            None => {
                let synthesized = synthesize_body(definition, values, &consumed);
                if method == Method::GET || method == Method::HEAD {
                    query.extend(synthesized.iter().map(|(k, v)| (k.clone(), to_text(v))));
                    None
                } else {
                    encode_body(Value::Object(synthesized), &headers)
                }
            }
        };

        let url = finalize_url(&raw_url, query.iter())?;
        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }
}
