use heck::ToLowerCamelCase;
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value;

use super::FormatParser;
use super::common::{RequiredFields, scalar_string, str_field};
use super::infer::infer_schema;
use crate::error::ParseError;
use crate::model::{
    ApiKeyLocation, Endpoint, Method, OAuthFlow, Parameter, ParameterLocation, RequestBody,
    Response, SchemaBody, SchemaNode, SchemaType, SecurityRequirement, SecurityScheme,
    SecuritySchemeKind, Server, SpecFormat, UnifiedSpec,
};

/// Headers every client sends; they say nothing about the API itself.
const TRANSPORT_HEADERS: [&str; 4] = ["content-type", "accept", "user-agent", "content-length"];

/// Postman collection v2.0 / v2.1 parser.
pub struct PostmanParser;

impl FormatParser for PostmanParser {
    fn format(&self) -> SpecFormat {
        SpecFormat::Postman
    }

    fn parse_value(&self, document: &Value) -> Result<UnifiedSpec, ParseError> {
        let info = document.get("info");
        let schema_url = info.and_then(|i| str_field(i, "schema"));
        let schema_version = match schema_url.as_deref() {
            Some(url) => Some(collection_version(url)?),
            None => None,
        };

        let mut required = RequiredFields::new(SpecFormat::Postman);
        let title = required.scalar(info, "name", "info.name");
        if schema_version.is_none() {
            required.scalar(info, "schema", "info.schema");
        }
        let items = required.array(Some(document), "item", "item");
        required.finish()?;
        let (Some(title), Some(schema_version), Some(items)) = (title, schema_version, items)
        else {
            return Err(ParseError::Format("incomplete Postman collection".to_string()));
        };

        let version = info
            .and_then(|i| i.get("version"))
            .and_then(postman_version)
            .unwrap_or(schema_version);
        let mut spec = UnifiedSpec::new(SpecFormat::Postman, title, version);
        spec.description = info.and_then(description_text);

        let mut ctx = PostmanContext {
            variables: collect_variables(document.get("variable")),
            schemes: Vec::new(),
            servers: Vec::new(),
        };
        let collection_auth = document.get("auth").and_then(|a| ctx.register_auth(a, "collection"));
        if let Some(ref requirement) = collection_auth {
            spec.security = vec![requirement.clone()];
        }

        let mut folders = Vec::new();
        ctx.walk(items, &mut folders, collection_auth.as_ref(), &mut spec.endpoints);

        spec.security_schemes = ctx.schemes;
        spec.servers = ctx.servers;
        debug!(
            "parsed Postman collection '{}': {} requests",
            spec.title,
            spec.endpoints.len()
        );
        Ok(spec)
    }
}

/// Extract and check the collection version from an `info.schema` URL such
/// as `https://schema.getpostman.com/json/collection/v2.1.0/collection.json`.
fn collection_version(url: &str) -> Result<String, ParseError> {
    let version = url
        .split('/')
        .find(|seg| seg.starts_with('v') && seg[1..].starts_with(|c: char| c.is_ascii_digit()))
        .map(|seg| seg[1..].to_string());
    match version {
        Some(v) if v.starts_with("2.") => Ok(v),
        Some(v) => Err(ParseError::UnsupportedVersion {
            format: SpecFormat::Postman,
            version: v,
        }),
        None => Err(ParseError::UnsupportedVersion {
            format: SpecFormat::Postman,
            version: url.to_string(),
        }),
    }
}

/// `info.version` may be a string or the v2.0 `{major, minor, patch}` object.
fn postman_version(value: &Value) -> Option<String> {
    if let Some(v) = scalar_string(value) {
        return Some(v);
    }
    let part = |key: &str| value.get(key).and_then(Value::as_u64);
    Some(format!(
        "{}.{}.{}",
        part("major")?,
        part("minor").unwrap_or(0),
        part("patch").unwrap_or(0)
    ))
}

/// Descriptions are plain strings or `{content, type}` objects.
fn description_text(value: &Value) -> Option<String> {
    match value.get("description")? {
        Value::String(s) => Some(s.clone()),
        other => str_field(other, "content"),
    }
}

fn collect_variables(value: Option<&Value>) -> IndexMap<String, String> {
    value
        .and_then(Value::as_array)
        .map(|vars| {
            vars.iter()
                .filter_map(|v| Some((str_field(v, "key")?, v.get("value").and_then(scalar_string)?)))
                .collect()
        })
        .unwrap_or_default()
}

struct PostmanContext {
    variables: IndexMap<String, String>,
    schemes: Vec<SecurityScheme>,
    servers: Vec<Server>,
}

impl PostmanContext {
    fn walk(
        &mut self,
        items: &[Value],
        folders: &mut Vec<String>,
        inherited_auth: Option<&SecurityRequirement>,
        out: &mut Vec<Endpoint>,
    ) {
        for item in items {
            let name = str_field(item, "name").unwrap_or_default();
            // An explicit `noauth` clears inherited security
            let own_auth = item.get("auth").map(|a| self.register_auth(a, &name));
            let auth = match &own_auth {
                Some(resolved) => resolved.as_ref(),
                None => inherited_auth,
            };

            if let Some(children) = item.get("item").and_then(Value::as_array) {
                folders.push(name);
                self.walk(children, folders, auth, out);
                folders.pop();
                continue;
            }
            let Some(request) = item.get("request") else {
                warn!("skipping Postman item '{name}' without a request");
                continue;
            };
            let request_auth = request.get("auth").map(|a| self.register_auth(a, &name));
            let auth = match &request_auth {
                Some(resolved) => resolved.as_ref(),
                None => auth,
            };
            let mut endpoint = self.build_endpoint(&name, item, request, folders);
            endpoint.security = auth.cloned().into_iter().collect();
            out.push(endpoint);
        }
    }

    fn build_endpoint(
        &mut self,
        name: &str,
        item: &Value,
        request: &Value,
        folders: &[String],
    ) -> Endpoint {
        let method = request
            .get("method")
            .and_then(Value::as_str)
            .and_then(Method::from_http)
            .unwrap_or(Method::Get);
        let url = request.get("url");
        let (path, mut parameters) = self.parse_url(url);

        let mut endpoint = Endpoint::new(path, method);
        if !name.is_empty() {
            endpoint.operation_id = Some(name.to_lower_camel_case());
            endpoint.summary = Some(name.to_string());
        }
        endpoint.description = description_text(request).or_else(|| description_text(item));
        endpoint.tags = folders.to_vec();

        if let Some(headers) = request.get("header").and_then(Value::as_array) {
            for header in headers.iter().filter(|h| !is_disabled(h)) {
                let Some(key) = str_field(header, "key") else {
                    continue;
                };
                if TRANSPORT_HEADERS.contains(&key.to_ascii_lowercase().as_str()) {
                    continue;
                }
                let mut param = Parameter::new(key, ParameterLocation::Header);
                param.description = description_text(header);
                param.schema = Some(SchemaNode::of_type(SchemaType::String));
                parameters.push(param);
            }
        }
        endpoint.parameters = parameters;
        endpoint.request_body = request.get("body").and_then(parse_body);

        if let Some(examples) = item.get("response").and_then(Value::as_array) {
            for example in examples {
                let response = parse_example_response(example);
                if !endpoint.responses.iter().any(|r| r.status == response.status) {
                    endpoint.responses.push(response);
                }
            }
        }
        endpoint
    }

    /// Returns the templated path and its path and query parameters.
    fn parse_url(&mut self, url: Option<&Value>) -> (String, Vec<Parameter>) {
        let mut params = Vec::new();
        let (host, segments, query): (Option<String>, Vec<String>, Vec<(String, bool)>) = match url
        {
            Some(Value::String(raw)) => split_raw_url(raw),
            Some(obj @ Value::Object(_)) => {
                let host = match obj.get("host") {
                    Some(Value::Array(parts)) => Some(
                        parts
                            .iter()
                            .filter_map(Value::as_str)
                            .collect::<Vec<_>>()
                            .join("."),
                    ),
                    Some(Value::String(h)) => Some(h.clone()),
                    _ => None,
                };
                let protocol = str_field(obj, "protocol");
                let host = host.map(|h| match protocol {
                    Some(p) => format!("{p}://{h}"),
                    None => h,
                });
                let segments = match obj.get("path") {
                    Some(Value::Array(parts)) => parts
                        .iter()
                        .filter_map(|p| scalar_string(p).or_else(|| str_field(p, "value")))
                        .collect(),
                    Some(Value::String(p)) => p
                        .split('/')
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect(),
                    _ => Vec::new(),
                };
                let query = obj
                    .get("query")
                    .and_then(Value::as_array)
                    .map(|q| {
                        q.iter()
                            .filter_map(|p| Some((str_field(p, "key")?, is_disabled(p))))
                            .collect()
                    })
                    .unwrap_or_default();
                (host, segments, query)
            }
            _ => (None, Vec::new(), Vec::new()),
        };

        if let Some(host) = host {
            let url = self.substitute(&host);
            if !self.servers.iter().any(|s| s.url == url) {
                self.servers.push(Server {
                    url,
                    description: None,
                });
            }
        }

        let mut path = String::new();
        for segment in segments {
            path.push('/');
            let variable = segment
                .strip_prefix(':')
                .or_else(|| segment.strip_prefix("{{").and_then(|s| s.strip_suffix("}}")));
            match variable {
                Some(var) => {
                    path.push_str(&format!("{{{var}}}"));
                    let mut param = Parameter::new(var, ParameterLocation::Path);
                    param.schema = Some(SchemaNode::of_type(SchemaType::String));
                    params.push(param);
                }
                None => path.push_str(&segment),
            }
        }
        if path.is_empty() {
            path.push('/');
        }

        for (key, disabled) in query {
            if disabled {
                continue;
            }
            let mut param = Parameter::new(key, ParameterLocation::Query);
            param.schema = Some(SchemaNode::of_type(SchemaType::String));
            params.push(param);
        }
        (path, params)
    }

    /// Replace `{{name}}` collection variables.
    fn substitute(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (key, value) in &self.variables {
            out = out.replace(&format!("{{{{{key}}}}}"), value);
        }
        out
    }

    /// Register an auth block as a security scheme and return the
    /// requirement pointing at it. `noauth` yields `None`.
    fn register_auth(&mut self, auth: &Value, owner: &str) -> Option<SecurityRequirement> {
        let kind = auth.get("type").and_then(Value::as_str)?;
        let attr = |key: &str| auth_attr(auth, kind, key);
        let mut scheme = match kind {
            "noauth" => return None,
            "bearer" | "jwt" => {
                let mut s = SecurityScheme::new("", SecuritySchemeKind::Http);
                s.scheme = Some("bearer".to_string());
                if kind == "jwt" {
                    s.bearer_format = Some("JWT".to_string());
                }
                s
            }
            "basic" | "digest" => {
                let mut s = SecurityScheme::new("", SecuritySchemeKind::Http);
                s.scheme = Some(kind.to_string());
                s
            }
            "apikey" => {
                let mut s = SecurityScheme::new("", SecuritySchemeKind::ApiKey);
                s.location = attr("in")
                    .as_deref()
                    .and_then(ApiKeyLocation::parse)
                    .or(Some(ApiKeyLocation::Header));
                s.parameter_name = attr("key");
                s
            }
            "oauth2" => {
                let mut s = SecurityScheme::new("", SecuritySchemeKind::OAuth2);
                let grant = attr("grant_type").unwrap_or_else(|| "authorization_code".to_string());
                s.flows.push(OAuthFlow {
                    flow: grant.to_lower_camel_case(),
                    authorization_url: attr("authUrl"),
                    token_url: attr("accessTokenUrl"),
                    refresh_url: None,
                    scopes: attr("scope")
                        .map(|s| s.split_whitespace().map(str::to_string).collect())
                        .unwrap_or_default(),
                });
                s
            }
            "hawk" | "awsv4" | "akamai" | "edgegrid" => {
                let mut s = SecurityScheme::new("", SecuritySchemeKind::Http);
                s.scheme = Some(if kind == "awsv4" {
                    "aws4-hmac-sha256".to_string()
                } else {
                    kind.to_string()
                });
                s.description = Some("HMAC request signature".to_string());
                s
            }
            other => {
                warn!("ignoring unsupported Postman auth type '{other}' on '{owner}'");
                return None;
            }
        };

        let existing = self.schemes.iter().find(|s| {
            s.kind == scheme.kind
                && s.scheme == scheme.scheme
                && s.parameter_name == scheme.parameter_name
                && s.location == scheme.location
                && s.flows == scheme.flows
        });
        let name = match existing {
            Some(s) => s.name.clone(),
            None => {
                let base = format!("{}Auth", kind.to_lower_camel_case());
                let mut name = base.clone();
                let mut n = 2;
                while self.schemes.iter().any(|s| s.name == name) {
                    name = format!("{base}{n}");
                    n += 1;
                }
                scheme.name = name.clone();
                self.schemes.push(scheme);
                name
            }
        };
        let mut requirement = SecurityRequirement::new();
        requirement.insert(name, Vec::new());
        Some(requirement)
    }
}

/// Read an auth attribute from the v2.1 `[{key, value}]` list form or the
/// v2.0 object form.
fn auth_attr(auth: &Value, kind: &str, key: &str) -> Option<String> {
    match auth.get(kind)? {
        Value::Array(entries) => entries
            .iter()
            .find(|e| e.get("key").and_then(Value::as_str) == Some(key))
            .and_then(|e| e.get("value"))
            .and_then(scalar_string),
        obj @ Value::Object(_) => obj.get(key).and_then(scalar_string),
        _ => None,
    }
}

fn is_disabled(value: &Value) -> bool {
    value.get("disabled").and_then(Value::as_bool).unwrap_or(false)
}

/// Split a v2.0 string URL into host, path segments and query keys.
fn split_raw_url(raw: &str) -> (Option<String>, Vec<String>, Vec<(String, bool)>) {
    let (before_query, query) = match raw.split_once('?') {
        Some((b, q)) => (b, Some(q)),
        None => (raw, None),
    };
    let (host, path) = match before_query.split_once("://") {
        Some((scheme, rest)) => match rest.split_once('/') {
            Some((host, path)) => (Some(format!("{scheme}://{host}")), path),
            None => (Some(format!("{scheme}://{rest}")), ""),
        },
        None if before_query.starts_with("{{") => match before_query.split_once('/') {
            Some((host, path)) => (Some(host.to_string()), path),
            None => (Some(before_query.to_string()), ""),
        },
        None => (None, before_query),
    };
    let segments = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let query = query
        .map(|q| {
            q.split('&')
                .filter_map(|pair| pair.split('=').next())
                .filter(|k| !k.is_empty())
                .map(|k| (k.to_string(), false))
                .collect()
        })
        .unwrap_or_default();
    (host, segments, query)
}

fn parse_body(body: &Value) -> Option<RequestBody> {
    let mode = body.get("mode").and_then(Value::as_str)?;
    let (content_type, schema) = match mode {
        "raw" => {
            let raw = body.get("raw").and_then(Value::as_str).unwrap_or_default();
            let language = body
                .get("options")
                .and_then(|o| o.get("raw"))
                .and_then(|r| r.get("language"))
                .and_then(Value::as_str);
            match serde_json::from_str::<Value>(raw) {
                Ok(example) => ("application/json".to_string(), Some(infer_schema(&example))),
                Err(_) if language == Some("json") => ("application/json".to_string(), None),
                Err(_) => (
                    "text/plain".to_string(),
                    Some(SchemaNode::of_type(SchemaType::String)),
                ),
            }
        }
        "urlencoded" | "formdata" => {
            let mut form = SchemaBody::of_type(SchemaType::Object);
            if let Some(fields) = body.get(mode).and_then(Value::as_array) {
                for field in fields.iter().filter(|f| !is_disabled(f)) {
                    let Some(key) = str_field(field, "key") else {
                        continue;
                    };
                    let mut prop = SchemaBody::of_type(SchemaType::String);
                    if field.get("type").and_then(Value::as_str) == Some("file") {
                        prop.format = Some("binary".to_string());
                    }
                    form.properties.insert(key, SchemaNode::resolved(prop));
                }
            }
            let content_type = if mode == "urlencoded" {
                "application/x-www-form-urlencoded"
            } else {
                "multipart/form-data"
            };
            (content_type.to_string(), Some(SchemaNode::resolved(form)))
        }
        "graphql" => (
            "application/json".to_string(),
            Some(SchemaNode::of_type(SchemaType::Object)),
        ),
        "file" => (
            "application/octet-stream".to_string(),
            Some(SchemaNode::resolved(SchemaBody {
                schema_type: Some(SchemaType::String),
                format: Some("binary".to_string()),
                ..SchemaBody::default()
            })),
        ),
        _ => return None,
    };
    Some(RequestBody {
        content_type,
        required: true,
        description: None,
        schema,
    })
}

fn parse_example_response(example: &Value) -> Response {
    let status = example
        .get("code")
        .and_then(scalar_string)
        .unwrap_or_else(|| "default".to_string());
    let declared_type = example
        .get("header")
        .and_then(Value::as_array)
        .and_then(|headers| {
            headers.iter().find(|h| {
                h.get("key")
                    .and_then(Value::as_str)
                    .is_some_and(|k| k.eq_ignore_ascii_case("content-type"))
            })
        })
        .and_then(|h| str_field(h, "value"));
    let parsed = example
        .get("body")
        .and_then(Value::as_str)
        .and_then(|b| serde_json::from_str::<Value>(b).ok());
    let content_type = declared_type.or_else(|| parsed.as_ref().map(|_| "application/json".to_string()));
    Response {
        status,
        description: str_field(example, "name").or_else(|| str_field(example, "status")),
        content_type,
        schema: parsed.as_ref().map(infer_schema),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_version() {
        assert_eq!(
            collection_version(
                "https://schema.getpostman.com/json/collection/v2.1.0/collection.json"
            )
            .unwrap(),
            "2.1.0"
        );
        assert!(matches!(
            collection_version("https://schema.getpostman.com/json/collection/v1.0.0/"),
            Err(ParseError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_split_raw_url() {
        let (host, segments, query) =
            split_raw_url("https://api.example.com/users/:id?expand=true&limit=");
        assert_eq!(host.as_deref(), Some("https://api.example.com"));
        assert_eq!(segments, vec!["users", ":id"]);
        assert_eq!(
            query,
            vec![("expand".to_string(), false), ("limit".to_string(), false)]
        );

        let (host, segments, _) = split_raw_url("{{baseUrl}}/pets");
        assert_eq!(host.as_deref(), Some("{{baseUrl}}"));
        assert_eq!(segments, vec!["pets"]);
    }

    #[test]
    fn test_postman_version_object() {
        let v = serde_json::json!({ "major": 1, "minor": 2 });
        assert_eq!(postman_version(&v).as_deref(), Some("1.2.0"));
    }

    #[test]
    fn test_missing_fields_are_collected() {
        let err = PostmanParser
            .parse(r#"{ "info": { "schema": "https://schema.getpostman.com/json/collection/v2.1.0/collection.json" } }"#)
            .unwrap_err();
        assert_eq!(err.missing_fields(), &["info.name", "item"]);
    }
}
