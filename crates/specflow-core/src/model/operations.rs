use serde::{Deserialize, Serialize};

use super::schemas::SchemaNode;
use super::security::SecurityRequirement;

/// The verb an endpoint is invoked with.
///
/// HTTP verbs cover OpenAPI and Postman; AsyncAPI channels map to
/// `Publish`/`Subscribe` and GraphQL root fields to their operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
    Publish,
    Subscribe,
    Query,
    Mutation,
    Subscription,
}

impl Method {
    /// HTTP verbs in the order OpenAPI path items list them.
    pub const HTTP: [Method; 8] = [
        Method::Get,
        Method::Put,
        Method::Post,
        Method::Delete,
        Method::Options,
        Method::Head,
        Method::Patch,
        Method::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Head => "HEAD",
            Method::Patch => "PATCH",
            Method::Trace => "TRACE",
            Method::Publish => "PUBLISH",
            Method::Subscribe => "SUBSCRIBE",
            Method::Query => "QUERY",
            Method::Mutation => "MUTATION",
            Method::Subscription => "SUBSCRIPTION",
        }
    }

    /// Lowercase key used by OpenAPI path items.
    pub fn key(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Put => "put",
            Method::Post => "post",
            Method::Delete => "delete",
            Method::Options => "options",
            Method::Head => "head",
            Method::Patch => "patch",
            Method::Trace => "trace",
            Method::Publish => "publish",
            Method::Subscribe => "subscribe",
            Method::Query => "query",
            Method::Mutation => "mutation",
            Method::Subscription => "subscription",
        }
    }

    /// Parse an HTTP verb, case-insensitively.
    pub fn from_http(verb: &str) -> Option<Method> {
        Method::HTTP
            .into_iter()
            .find(|m| m.key().eq_ignore_ascii_case(verb))
    }

    pub fn is_http(&self) -> bool {
        Method::HTTP.contains(self)
    }
}

/// Parameter location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Header,
    Path,
    Cookie,
}

impl ParameterLocation {
    pub fn parse(value: &str) -> Option<ParameterLocation> {
        match value {
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "path" => Some(ParameterLocation::Path),
            "cookie" => Some(ParameterLocation::Cookie),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Path => "path",
            ParameterLocation::Cookie => "cookie",
        }
    }
}

/// An endpoint parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaNode>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, location: ParameterLocation) -> Self {
        Self {
            name: name.into(),
            location,
            required: location == ParameterLocation::Path,
            deprecated: false,
            description: None,
            schema: None,
        }
    }
}

/// A request body, reduced to its preferred media type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub content_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaNode>,
}

/// A response keyed by status code (or `default`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaNode>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.status.starts_with('2')
    }
}

/// One method on one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub path: String,
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responses: Vec<Response>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub deprecated: bool,
}

impl Endpoint {
    pub fn new(path: impl Into<String>, method: Method) -> Self {
        Self {
            path: path.into(),
            method,
            operation_id: None,
            summary: None,
            description: None,
            parameters: Vec::new(),
            request_body: None,
            responses: Vec::new(),
            security: Vec::new(),
            tags: Vec::new(),
            deprecated: false,
        }
    }

    pub fn parameters_in(&self, location: ParameterLocation) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
    }

    /// The first 2xx response, falling back to `default`.
    pub fn success_response(&self) -> Option<&Response> {
        self.responses
            .iter()
            .find(|r| r.is_success())
            .or_else(|| self.responses.iter().find(|r| r.status == "default"))
    }

    /// Every schema attached to a parameter, the request body or a response.
    pub fn schemas(&self) -> impl Iterator<Item = &SchemaNode> {
        let params = self.parameters.iter().filter_map(|p| p.schema.as_ref());
        let body = self.request_body.iter().filter_map(|b| b.schema.as_ref());
        let responses = self.responses.iter().filter_map(|r| r.schema.as_ref());
        params.chain(body).chain(responses)
    }

    pub fn schemas_mut(&mut self) -> impl Iterator<Item = &mut SchemaNode> {
        let params = self.parameters.iter_mut().filter_map(|p| p.schema.as_mut());
        let body = self
            .request_body
            .iter_mut()
            .filter_map(|b| b.schema.as_mut());
        let responses = self.responses.iter_mut().filter_map(|r| r.schema.as_mut());
        params.chain(body).chain(responses)
    }
}
