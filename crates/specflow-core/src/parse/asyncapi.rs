use log::{debug, warn};
use serde_json::Value;

use super::FormatParser;
use super::common::{
    RequiredFields, bool_field, check_major, parse_security_requirements, parse_security_schemes,
    parse_servers, scalar_string, str_field,
};
use super::refs::{ReferenceTable, pointer_name};
use crate::error::ParseError;
use crate::model::{
    Endpoint, Method, Parameter, ParameterLocation, RequestBody, SchemaBody, SchemaNode,
    SecurityRequirement, SpecFormat, UnifiedSpec,
};

const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// AsyncAPI 2.x parser. Each channel operation becomes an endpoint whose
/// request body is the message payload.
pub struct AsyncApiParser;

impl FormatParser for AsyncApiParser {
    fn format(&self) -> SpecFormat {
        SpecFormat::AsyncApi
    }

    fn parse_value(&self, document: &Value) -> Result<UnifiedSpec, ParseError> {
        let marker = document.get("asyncapi").and_then(scalar_string);
        if let Some(ref version) = marker {
            check_major(SpecFormat::AsyncApi, version, "2")?;
        }

        let mut required = RequiredFields::new(SpecFormat::AsyncApi);
        if marker.is_none() {
            required.scalar(Some(document), "asyncapi", "asyncapi");
        }
        let info = document.get("info");
        let title = required.scalar(info, "title", "info.title");
        let version = required.scalar(info, "version", "info.version");
        let channels = required.object(Some(document), "channels", "channels");
        required.finish()?;
        let (Some(title), Some(version), Some(channels)) = (title, version, channels) else {
            return Err(ParseError::Format("incomplete AsyncAPI document".to_string()));
        };

        let components = document.get("components");
        let mut ctx = AsyncApiContext {
            components,
            table: ReferenceTable::with_definitions(
                components
                    .and_then(|c| c.get("schemas"))
                    .and_then(Value::as_object),
            ),
            default_content_type: str_field(document, "defaultContentType")
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        };

        let mut spec = UnifiedSpec::new(SpecFormat::AsyncApi, title, version);
        spec.description = info.and_then(|i| str_field(i, "description"));
        spec.servers = parse_servers(document.get("servers"));
        spec.security = server_security(document.get("servers"));
        spec.security_schemes = parse_security_schemes(
            components
                .and_then(|c| c.get("securitySchemes"))
                .and_then(Value::as_object),
        );

        for (channel, item) in channels {
            for (key, method) in [("publish", Method::Publish), ("subscribe", Method::Subscribe)] {
                let Some(op) = item.get(key).filter(|op| op.is_object()) else {
                    continue;
                };
                let mut endpoint = ctx.build_endpoint(channel, item, method, op);
                endpoint.security = spec.security.clone();
                spec.endpoints.push(endpoint);
            }
        }
        spec.schemas = ctx.table.into_schemas();

        debug!(
            "parsed AsyncAPI '{}': {} operations, {} schemas",
            spec.title,
            spec.endpoints.len(),
            spec.schemas.len()
        );
        Ok(spec)
    }
}

struct AsyncApiContext<'doc> {
    components: Option<&'doc Value>,
    table: ReferenceTable<'doc>,
    default_content_type: String,
}

impl<'doc> AsyncApiContext<'doc> {
    fn build_endpoint(
        &mut self,
        channel: &str,
        item: &'doc Value,
        method: Method,
        op: &'doc Value,
    ) -> Endpoint {
        let mut endpoint = Endpoint::new(channel, method);
        endpoint.operation_id = str_field(op, "operationId");
        endpoint.summary = str_field(op, "summary");
        endpoint.description =
            str_field(op, "description").or_else(|| str_field(item, "description"));
        endpoint.deprecated = bool_field(op, "deprecated");
        endpoint.tags = op
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(|t| str_field(t, "name")).collect())
            .unwrap_or_default();

        if let Some(params) = item.get("parameters").and_then(Value::as_object) {
            for (name, def) in params {
                let def = self.follow(def, "parameters");
                let mut param = Parameter::new(name.clone(), ParameterLocation::Path);
                param.description = str_field(def, "description");
                param.schema = def.get("schema").map(|s| self.table.build(s));
                endpoint.parameters.push(param);
            }
        }

        if let Some(message) = op.get("message") {
            let message = self.follow(message, "messages");
            let variants: Vec<&'doc Value> = match message.get("oneOf").and_then(Value::as_array) {
                Some(list) => list.iter().map(|m| self.follow(m, "messages")).collect(),
                None => vec![message],
            };

            for &variant in &variants {
                self.collect_headers(variant, &mut endpoint.parameters);
            }

            let content_type = variants
                .iter()
                .find_map(|m| str_field(m, "contentType"))
                .unwrap_or_else(|| self.default_content_type.clone());
            let payloads: Vec<SchemaNode> = variants
                .iter()
                .filter_map(|m| m.get("payload"))
                .map(|p| self.table.build(p))
                .collect();
            let schema = match payloads.len() {
                0 => None,
                1 => payloads.into_iter().next(),
                _ => Some(SchemaNode::resolved(SchemaBody {
                    one_of: payloads,
                    ..SchemaBody::default()
                })),
            };
            endpoint.request_body = Some(RequestBody {
                content_type,
                required: true,
                description: str_field(message, "description")
                    .or_else(|| str_field(message, "summary")),
                schema,
            });
        }
        endpoint
    }

    /// Message headers become header parameters.
    fn collect_headers(&mut self, message: &'doc Value, out: &mut Vec<Parameter>) {
        let Some(headers) = message.get("headers") else {
            return;
        };
        let headers = match headers.get("$ref").and_then(Value::as_str) {
            Some(pointer) => self
                .components
                .and_then(|c| c.get("schemas"))
                .and_then(|s| s.get(pointer_name(pointer)))
                .unwrap_or(headers),
            None => headers,
        };
        let Some(props) = headers.get("properties").and_then(Value::as_object) else {
            return;
        };
        let required: Vec<&str> = headers
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        for (name, schema) in props {
            let duplicate = out.iter().any(|p| {
                p.location == ParameterLocation::Header && p.name.eq_ignore_ascii_case(name)
            });
            if duplicate {
                continue;
            }
            let mut param = Parameter::new(name.clone(), ParameterLocation::Header);
            param.required = required.contains(&name.as_str());
            param.description = str_field(schema, "description");
            param.schema = Some(self.table.build(schema));
            out.push(param);
        }
    }

    fn follow(&self, value: &'doc Value, section: &str) -> &'doc Value {
        let Some(pointer) = value.get("$ref").and_then(Value::as_str) else {
            return value;
        };
        match self
            .components
            .and_then(|c| c.get(section))
            .and_then(|s| s.get(pointer_name(pointer)))
        {
            Some(target) => target,
            None => {
                warn!("unresolved {section} reference '{pointer}'");
                value
            }
        }
    }
}

/// AsyncAPI 2.x declares security per server; the union becomes the
/// document-wide requirement list.
fn server_security(servers: Option<&Value>) -> Vec<SecurityRequirement> {
    let Some(servers) = servers.and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut out: Vec<SecurityRequirement> = Vec::new();
    for server in servers.values() {
        for req in parse_security_requirements(server.get("security")) {
            if !out.contains(&req) {
                out.push(req);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_EVENTS: &str = r#"
asyncapi: 2.6.0
info:
  title: User Events
  version: 1.0.0
servers:
  production:
    url: broker.example.com
    protocol: kafka
    security:
      - saslScram: []
channels:
  user/{userId}/signedup:
    parameters:
      userId:
        schema: { type: string }
    subscribe:
      operationId: onUserSignedUp
      tags: [{ name: users }]
      message:
        $ref: '#/components/messages/UserSignedUp'
components:
  messages:
    UserSignedUp:
      contentType: application/json
      headers:
        type: object
        required: [x-correlation-id]
        properties:
          x-correlation-id: { type: string }
      payload:
        $ref: '#/components/schemas/User'
  schemas:
    User:
      type: object
      properties:
        id: { type: string }
        email: { type: string, format: email }
  securitySchemes:
    saslScram:
      type: scramSha256
    userPass:
      type: userPassword
"#;

    #[test]
    fn test_parse_channels() {
        let spec = AsyncApiParser.parse(USER_EVENTS).unwrap();
        assert_eq!(spec.format, SpecFormat::AsyncApi);
        assert_eq!(spec.endpoints.len(), 1);

        let op = &spec.endpoints[0];
        assert_eq!(op.method, Method::Subscribe);
        assert_eq!(op.path, "user/{userId}/signedup");
        assert_eq!(op.tags, vec!["users"]);
        assert!(op.parameters.iter().any(|p| p.name == "userId" && p.required));
        let header = op
            .parameters_in(ParameterLocation::Header)
            .next()
            .unwrap();
        assert_eq!(header.name, "x-correlation-id");
        assert!(header.required);

        let body = op.request_body.as_ref().unwrap();
        assert_eq!(body.schema, Some(SchemaNode::reference("User")));
        assert!(spec.schemas["User"].body().unwrap().properties.contains_key("email"));
        assert_eq!(spec.security.len(), 1);
    }

    #[test]
    fn test_user_password_maps_to_basic() {
        let spec = AsyncApiParser.parse(USER_EVENTS).unwrap();
        assert_eq!(spec.security_schemes.len(), 1);
        assert!(spec.security_schemes[0].is_http_scheme("basic"));
    }

    #[test]
    fn test_rejects_asyncapi_three() {
        let err = AsyncApiParser
            .parse("asyncapi: 3.0.0\ninfo: {title: t, version: '1'}\nchannels: {}\n")
            .unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedVersion { .. }));
    }
}
