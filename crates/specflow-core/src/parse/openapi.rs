use log::{debug, warn};
use serde_json::Value;

use super::FormatParser;
use super::common::{
    RequiredFields, bool_field, check_major, parse_security_requirements, parse_security_schemes,
    parse_servers, pick_media_type, scalar_string, str_field, string_list,
};
use super::refs::{ReferenceTable, pointer_name};
use crate::error::ParseError;
use crate::model::{
    Endpoint, Method, Parameter, ParameterLocation, RequestBody, Response, SecurityRequirement,
    SpecFormat, UnifiedSpec,
};

/// Maximum `$ref` hops followed for parameters, bodies and responses.
const MAX_COMPONENT_HOPS: usize = 16;

/// OpenAPI 3.x parser.
pub struct OpenApiParser;

impl FormatParser for OpenApiParser {
    fn format(&self) -> SpecFormat {
        SpecFormat::OpenApi
    }

    fn parse_value(&self, document: &Value) -> Result<UnifiedSpec, ParseError> {
        let marker = document.get("openapi").and_then(scalar_string);
        if let Some(ref version) = marker {
            check_major(SpecFormat::OpenApi, version, "3")?;
        }

        let mut required = RequiredFields::new(SpecFormat::OpenApi);
        if marker.is_none() {
            required.scalar(Some(document), "openapi", "openapi");
        }
        let info = document.get("info");
        let title = required.scalar(info, "title", "info.title");
        let version = required.scalar(info, "version", "info.version");
        let paths = required.object(Some(document), "paths", "paths");
        required.finish()?;
        let (Some(title), Some(version), Some(paths)) = (title, version, paths) else {
            return Err(ParseError::Format("incomplete OpenAPI document".to_string()));
        };

        let components = document.get("components");
        let mut ctx = OpenApiContext {
            components,
            table: ReferenceTable::with_definitions(
                components
                    .and_then(|c| c.get("schemas"))
                    .and_then(Value::as_object),
            ),
            global_security: parse_security_requirements(document.get("security")),
        };

        let mut spec = UnifiedSpec::new(SpecFormat::OpenApi, title, version);
        spec.description = info.and_then(|i| str_field(i, "description"));
        spec.servers = parse_servers(document.get("servers"));
        spec.security = ctx.global_security.clone();
        spec.security_schemes = parse_security_schemes(
            components
                .and_then(|c| c.get("securitySchemes"))
                .and_then(Value::as_object),
        );

        for (path, item) in paths {
            ctx.collect_path(path, item, &mut spec.endpoints);
        }
        spec.schemas = ctx.table.into_schemas();

        debug!(
            "parsed OpenAPI '{}': {} endpoints, {} schemas",
            spec.title,
            spec.endpoints.len(),
            spec.schemas.len()
        );
        Ok(spec)
    }
}

/// State for a single OpenAPI parse call.
struct OpenApiContext<'doc> {
    components: Option<&'doc Value>,
    table: ReferenceTable<'doc>,
    global_security: Vec<SecurityRequirement>,
}

impl<'doc> OpenApiContext<'doc> {
    fn collect_path(&mut self, path: &str, item: &'doc Value, out: &mut Vec<Endpoint>) {
        let item = self.follow_component(item, "pathItems");
        let shared = self.parse_parameters(item.get("parameters"));

        for method in Method::HTTP {
            let Some(op) = item.get(method.key()).filter(|op| op.is_object()) else {
                continue;
            };
            let mut endpoint = Endpoint::new(path, method);
            endpoint.operation_id = str_field(op, "operationId");
            endpoint.summary = str_field(op, "summary");
            endpoint.description = str_field(op, "description");
            endpoint.tags = string_list(op.get("tags"));
            endpoint.deprecated = bool_field(op, "deprecated");

            endpoint.parameters = shared.clone();
            for param in self.parse_parameters(op.get("parameters")) {
                merge_parameter(&mut endpoint.parameters, param);
            }

            endpoint.request_body = op
                .get("requestBody")
                .and_then(|body| self.parse_request_body(body));

            if let Some(responses) = op.get("responses").and_then(Value::as_object) {
                endpoint.responses = responses
                    .iter()
                    .map(|(status, resp)| self.parse_response(status, resp))
                    .collect();
            }

            endpoint.security = if op.get("security").is_some() {
                parse_security_requirements(op.get("security"))
            } else {
                self.global_security.clone()
            };

            out.push(endpoint);
        }
    }

    /// Follow `$ref` pointers into `components.<section>`.
    fn follow_component(&self, value: &'doc Value, section: &str) -> &'doc Value {
        let mut current = value;
        for _ in 0..MAX_COMPONENT_HOPS {
            let Some(pointer) = current.get("$ref").and_then(Value::as_str) else {
                return current;
            };
            let name = pointer_name(pointer);
            match self
                .components
                .and_then(|c| c.get(section))
                .and_then(|s| s.get(&name))
            {
                Some(target) => current = target,
                None => {
                    warn!("unresolved {section} reference '{pointer}'");
                    return current;
                }
            }
        }
        warn!("too many {section} reference hops, stopping");
        current
    }

    fn parse_parameters(&mut self, value: Option<&'doc Value>) -> Vec<Parameter> {
        let Some(items) = value.and_then(Value::as_array) else {
            return Vec::new();
        };
        let mut params = Vec::with_capacity(items.len());
        for raw in items {
            let raw = self.follow_component(raw, "parameters");
            let name = str_field(raw, "name");
            let location = raw
                .get("in")
                .and_then(Value::as_str)
                .and_then(ParameterLocation::parse);
            let (Some(name), Some(location)) = (name, location) else {
                warn!("skipping parameter without a usable name or location");
                continue;
            };
            let mut param = Parameter::new(name, location);
            param.required = bool_field(raw, "required") || location == ParameterLocation::Path;
            param.deprecated = bool_field(raw, "deprecated");
            param.description = str_field(raw, "description");
            param.schema = match raw.get("schema") {
                Some(schema) => Some(self.table.build(schema)),
                None => raw
                    .get("content")
                    .and_then(Value::as_object)
                    .and_then(pick_media_type)
                    .and_then(|(_, media)| media.get("schema"))
                    .map(|schema| self.table.build(schema)),
            };
            merge_parameter(&mut params, param);
        }
        params
    }

    fn parse_request_body(&mut self, value: &'doc Value) -> Option<RequestBody> {
        let body = self.follow_component(value, "requestBodies");
        let content = body.get("content").and_then(Value::as_object)?;
        let (content_type, media) = pick_media_type(content)?;
        Some(RequestBody {
            content_type: content_type.clone(),
            required: bool_field(body, "required"),
            description: str_field(body, "description"),
            schema: media.get("schema").map(|s| self.table.build(s)),
        })
    }

    fn parse_response(&mut self, status: &str, value: &'doc Value) -> Response {
        let resp = self.follow_component(value, "responses");
        let media = resp
            .get("content")
            .and_then(Value::as_object)
            .and_then(pick_media_type);
        Response {
            status: status.to_string(),
            description: str_field(resp, "description"),
            content_type: media.map(|(ct, _)| ct.clone()),
            schema: media
                .and_then(|(_, m)| m.get("schema"))
                .map(|s| self.table.build(s)),
        }
    }
}

/// Insert a parameter, replacing an existing one with the same name and
/// location so operation-level declarations override path-level ones.
fn merge_parameter(params: &mut Vec<Parameter>, param: Parameter) {
    match params
        .iter_mut()
        .find(|p| p.name == param.name && p.location == param.location)
    {
        Some(existing) => *existing = param,
        None => params.push(param),
    }
}
