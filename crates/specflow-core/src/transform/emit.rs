//! OpenAPI 3.0 serialization of a [`UnifiedSpec`].
//!
//! Every format is emitted as OpenAPI so downstream generators see one
//! shape. Non-HTTP operations (channel operations, GraphQL root fields)
//! map onto an HTTP verb and keep their original kind in `x-specflow-method`.

use log::warn;
use serde_json::{Map, Value, json};

use super::schema_resolver::sort_keys;
use crate::model::{
    AdditionalProperties, Endpoint, Method, Parameter, SchemaNode, SecurityScheme,
    SecuritySchemeKind, UnifiedSpec,
};

pub const OPENAPI_VERSION: &str = "3.0.3";

/// Build an OpenAPI 3.0 document in declaration order.
pub fn to_openapi(spec: &UnifiedSpec) -> Value {
    let mut info = Map::new();
    info.insert("title".into(), json!(spec.title));
    info.insert("version".into(), json!(spec.version));
    if let Some(desc) = &spec.description {
        info.insert("description".into(), json!(desc));
    }

    let mut doc = Map::new();
    doc.insert("openapi".into(), json!(OPENAPI_VERSION));
    doc.insert("info".into(), Value::Object(info));
    if !spec.servers.is_empty() {
        let servers: Vec<Value> = spec
            .servers
            .iter()
            .map(|s| {
                let mut server = Map::new();
                server.insert("url".into(), json!(s.url));
                if let Some(desc) = &s.description {
                    server.insert("description".into(), json!(desc));
                }
                Value::Object(server)
            })
            .collect();
        doc.insert("servers".into(), Value::Array(servers));
    }
    if !spec.security.is_empty() {
        doc.insert("security".into(), json!(spec.security));
    }

    let mut paths = Map::new();
    for endpoint in &spec.endpoints {
        let path = if endpoint.path.starts_with('/') {
            endpoint.path.clone()
        } else {
            format!("/{}", endpoint.path)
        };
        let item = paths
            .entry(path)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(item) = item {
            let verb = http_verb(endpoint.method);
            if item.contains_key(verb) {
                warn!(
                    "dropping {} {} from OpenAPI output: verb '{verb}' already used",
                    endpoint.method.as_str(),
                    endpoint.path
                );
                continue;
            }
            item.insert(verb.to_string(), operation(endpoint, spec));
        }
    }
    doc.insert("paths".into(), Value::Object(paths));

    let mut components = Map::new();
    if !spec.schemas.is_empty() {
        let schemas: Map<String, Value> = spec
            .schemas
            .iter()
            .map(|(name, node)| (name.clone(), schema_value(node)))
            .collect();
        components.insert("schemas".into(), Value::Object(schemas));
    }
    if !spec.security_schemes.is_empty() {
        let schemes: Map<String, Value> = spec
            .security_schemes
            .iter()
            .map(|s| (s.name.clone(), security_scheme_value(s)))
            .collect();
        components.insert("securitySchemes".into(), Value::Object(schemes));
    }
    if !components.is_empty() {
        doc.insert("components".into(), Value::Object(components));
    }
    Value::Object(doc)
}

/// The OpenAPI document with every object's keys sorted.
pub fn to_canonical_openapi(spec: &UnifiedSpec) -> Value {
    sort_keys(to_openapi(spec))
}

fn http_verb(method: Method) -> &'static str {
    match method {
        Method::Publish | Method::Mutation => "post",
        Method::Subscribe | Method::Query | Method::Subscription => "get",
        http => http.key(),
    }
}

fn operation(endpoint: &Endpoint, spec: &UnifiedSpec) -> Value {
    let mut op = Map::new();
    if let Some(id) = &endpoint.operation_id {
        op.insert("operationId".into(), json!(id));
    }
    if let Some(summary) = &endpoint.summary {
        op.insert("summary".into(), json!(summary));
    }
    if let Some(desc) = &endpoint.description {
        op.insert("description".into(), json!(desc));
    }
    if !endpoint.tags.is_empty() {
        op.insert("tags".into(), json!(endpoint.tags));
    }
    if endpoint.deprecated {
        op.insert("deprecated".into(), Value::Bool(true));
    }
    if !endpoint.method.is_http() {
        op.insert("x-specflow-method".into(), json!(endpoint.method.key()));
    }
    if !endpoint.parameters.is_empty() {
        let params: Vec<Value> = endpoint.parameters.iter().map(parameter_value).collect();
        op.insert("parameters".into(), Value::Array(params));
    }
    if let Some(body) = &endpoint.request_body {
        let mut media = Map::new();
        if let Some(schema) = &body.schema {
            media.insert("schema".into(), schema_value(schema));
        }
        let mut request = Map::new();
        if let Some(desc) = &body.description {
            request.insert("description".into(), json!(desc));
        }
        request.insert("required".into(), Value::Bool(body.required));
        request.insert("content".into(), content(&body.content_type, media));
        op.insert("requestBody".into(), Value::Object(request));
    }

    let mut responses = Map::new();
    for response in &endpoint.responses {
        let mut out = Map::new();
        out.insert(
            "description".into(),
            json!(response.description.clone().unwrap_or_default()),
        );
        if let Some(content_type) = &response.content_type {
            let mut media = Map::new();
            if let Some(schema) = &response.schema {
                media.insert("schema".into(), schema_value(schema));
            }
            out.insert("content".into(), content(content_type, media));
        }
        responses.insert(response.status.clone(), Value::Object(out));
    }
    if responses.is_empty() {
        responses.insert("default".into(), json!({ "description": "" }));
    }
    op.insert("responses".into(), Value::Object(responses));

    // Only spell out security when it differs from the document default
    if endpoint.security != spec.security {
        op.insert("security".into(), json!(endpoint.security));
    }
    Value::Object(op)
}

fn content(content_type: &str, media: Map<String, Value>) -> Value {
    let mut content = Map::new();
    content.insert(content_type.to_string(), Value::Object(media));
    Value::Object(content)
}

fn parameter_value(param: &Parameter) -> Value {
    let mut out = Map::new();
    out.insert("name".into(), json!(param.name));
    out.insert("in".into(), json!(param.location.as_str()));
    if param.required {
        out.insert("required".into(), Value::Bool(true));
    }
    if param.deprecated {
        out.insert("deprecated".into(), Value::Bool(true));
    }
    if let Some(desc) = &param.description {
        out.insert("description".into(), json!(desc));
    }
    if let Some(schema) = &param.schema {
        out.insert("schema".into(), schema_value(schema));
    }
    Value::Object(out)
}

/// Serialize a schema node with OpenAPI 3.0 keywords.
pub fn schema_value(node: &SchemaNode) -> Value {
    let body = match node {
        SchemaNode::Reference(name) => {
            return json!({ "$ref": format!("#/components/schemas/{name}") });
        }
        SchemaNode::Resolved(body) => body,
    };

    let mut out = Map::new();
    let mut text = |key: &str, value: &Option<String>| {
        if let Some(v) = value {
            out.insert(key.into(), json!(v));
        }
    };
    text("title", &body.title);
    text("description", &body.description);
    text("format", &body.format);
    text("pattern", &body.pattern);

    if let Some(t) = body.schema_type {
        out.insert("type".into(), json!(t.as_str()));
    }
    for (key, set) in [
        ("nullable", body.nullable),
        ("readOnly", body.read_only),
        ("writeOnly", body.write_only),
        ("deprecated", body.deprecated),
    ] {
        if set {
            out.insert(key.into(), Value::Bool(true));
        }
    }

    // 3.0 expresses exclusive bounds as a flag on minimum/maximum
    if let Some(min) = body.exclusive_minimum {
        out.insert("minimum".into(), json!(min));
        out.insert("exclusiveMinimum".into(), Value::Bool(true));
    } else if let Some(min) = body.minimum {
        out.insert("minimum".into(), json!(min));
    }
    if let Some(max) = body.exclusive_maximum {
        out.insert("maximum".into(), json!(max));
        out.insert("exclusiveMaximum".into(), Value::Bool(true));
    } else if let Some(max) = body.maximum {
        out.insert("maximum".into(), json!(max));
    }
    if let Some(m) = body.multiple_of {
        out.insert("multipleOf".into(), json!(m));
    }
    for (key, value) in [
        ("minLength", body.min_length),
        ("maxLength", body.max_length),
        ("minItems", body.min_items),
        ("maxItems", body.max_items),
    ] {
        if let Some(v) = value {
            out.insert(key.into(), json!(v));
        }
    }

    if !body.enum_values.is_empty() {
        out.insert("enum".into(), Value::Array(body.enum_values.clone()));
    }
    if let Some(default) = &body.default_value {
        out.insert("default".into(), default.clone());
    }
    if !body.properties.is_empty() {
        let props: Map<String, Value> = body
            .properties
            .iter()
            .map(|(name, prop)| (name.clone(), schema_value(prop)))
            .collect();
        out.insert("properties".into(), Value::Object(props));
    }
    if !body.required.is_empty() {
        out.insert("required".into(), json!(body.required));
    }
    if let Some(items) = &body.items {
        out.insert("items".into(), schema_value(items));
    }
    match &body.additional_properties {
        Some(AdditionalProperties::Bool(b)) => {
            out.insert("additionalProperties".into(), Value::Bool(*b));
        }
        Some(AdditionalProperties::Schema(schema)) => {
            out.insert("additionalProperties".into(), schema_value(schema));
        }
        None => {}
    }
    for (key, list) in [
        ("allOf", &body.all_of),
        ("oneOf", &body.one_of),
        ("anyOf", &body.any_of),
    ] {
        if !list.is_empty() {
            out.insert(key.into(), Value::Array(list.iter().map(schema_value).collect()));
        }
    }
    Value::Object(out)
}

fn security_scheme_value(scheme: &SecurityScheme) -> Value {
    let mut out = Map::new();
    out.insert("type".into(), json!(scheme.kind.as_str()));
    if let Some(desc) = &scheme.description {
        out.insert("description".into(), json!(desc));
    }
    match scheme.kind {
        SecuritySchemeKind::ApiKey => {
            if let Some(name) = &scheme.parameter_name {
                out.insert("name".into(), json!(name));
            }
            if let Some(location) = scheme.location {
                out.insert("in".into(), json!(location.as_str()));
            }
        }
        SecuritySchemeKind::Http => {
            if let Some(s) = &scheme.scheme {
                out.insert("scheme".into(), json!(s));
            }
            if let Some(format) = &scheme.bearer_format {
                out.insert("bearerFormat".into(), json!(format));
            }
        }
        SecuritySchemeKind::OAuth2 => {
            let mut flows = Map::new();
            for flow in &scheme.flows {
                let mut f = Map::new();
                if let Some(url) = &flow.authorization_url {
                    f.insert("authorizationUrl".into(), json!(url));
                }
                if let Some(url) = &flow.token_url {
                    f.insert("tokenUrl".into(), json!(url));
                }
                if let Some(url) = &flow.refresh_url {
                    f.insert("refreshUrl".into(), json!(url));
                }
                let scopes: Map<String, Value> = flow
                    .scopes
                    .iter()
                    .map(|s| (s.clone(), json!("")))
                    .collect();
                f.insert("scopes".into(), Value::Object(scopes));
                flows.insert(flow.flow.clone(), Value::Object(f));
            }
            out.insert("flows".into(), Value::Object(flows));
        }
        SecuritySchemeKind::OpenIdConnect => {
            if let Some(url) = &scheme.open_id_connect_url {
                out.insert("openIdConnectUrl".into(), json!(url));
            }
        }
    }
    Value::Object(out)
}
