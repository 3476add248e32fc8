use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::operations::Endpoint;
use super::schemas::SchemaNode;
use super::security::{SecurityRequirement, SecurityScheme};

/// The wire format an API description was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecFormat {
    OpenApi,
    AsyncApi,
    Postman,
    GraphQl,
}

impl SpecFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecFormat::OpenApi => "openapi",
            SpecFormat::AsyncApi => "asyncapi",
            SpecFormat::Postman => "postman",
            SpecFormat::GraphQl => "graphql",
        }
    }
}

impl fmt::Display for SpecFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpecFormat::OpenApi => "OpenAPI",
            SpecFormat::AsyncApi => "AsyncAPI",
            SpecFormat::Postman => "Postman",
            SpecFormat::GraphQl => "GraphQL",
        })
    }
}

/// Input text with an optional declared format and version.
///
/// Consumed once by [`crate::parse::parse_document`]; when no format is
/// declared it is detected from the document's own markers.
#[derive(Debug, Clone)]
pub struct RawSpecDocument {
    text: String,
    format: Option<SpecFormat>,
    version: Option<String>,
}

impl RawSpecDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: None,
            version: None,
        }
    }

    pub fn with_format(mut self, format: SpecFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn format(&self) -> Option<SpecFormat> {
        self.format
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A server URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Format-agnostic representation of an API description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedSpec {
    pub format: SpecFormat,
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    /// Named schemas in declaration order.
    #[serde(default)]
    pub schemas: IndexMap<String, SchemaNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_schemes: Vec<SecurityScheme>,
    /// Requirements applied to every endpoint that declares none of its own.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirement>,
}

impl UnifiedSpec {
    pub fn new(format: SpecFormat, title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            format,
            title: title.into(),
            version: version.into(),
            description: None,
            servers: Vec::new(),
            endpoints: Vec::new(),
            schemas: IndexMap::new(),
            security_schemes: Vec::new(),
            security: Vec::new(),
        }
    }

    /// Everything except endpoints and named schemas.
    pub fn clone_header(&self) -> UnifiedSpec {
        UnifiedSpec {
            format: self.format,
            title: self.title.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            servers: self.servers.clone(),
            endpoints: Vec::new(),
            schemas: IndexMap::new(),
            security_schemes: self.security_schemes.clone(),
            security: self.security.clone(),
        }
    }

    pub fn security_scheme(&self, name: &str) -> Option<&SecurityScheme> {
        self.security_schemes.iter().find(|s| s.name == name)
    }

    /// Number of distinct paths; each may carry several methods.
    pub fn path_count(&self) -> usize {
        let mut paths: Vec<&str> = self.endpoints.iter().map(|e| e.path.as_str()).collect();
        paths.sort_unstable();
        paths.dedup();
        paths.len()
    }
}

/// One unit of processing work: an endpoint or a named model.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecItem {
    Endpoint(Endpoint),
    Model { name: String, schema: SchemaNode },
}

impl SpecItem {
    pub fn is_endpoint(&self) -> bool {
        matches!(self, SpecItem::Endpoint(_))
    }

    /// A stable identity used to compare item sets across strategies.
    pub fn key(&self) -> String {
        match self {
            SpecItem::Endpoint(e) => format!("endpoint:{} {}", e.method.as_str(), e.path),
            SpecItem::Model { name, .. } => format!("model:{name}"),
        }
    }
}
