use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A security scheme type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecuritySchemeKind {
    #[serde(rename = "oauth2")]
    OAuth2,
    ApiKey,
    Http,
    OpenIdConnect,
}

impl SecuritySchemeKind {
    /// Map a declared `type` value; AsyncAPI spellings fold into the
    /// OpenAPI kinds they describe.
    pub fn parse(value: &str) -> Option<SecuritySchemeKind> {
        match value {
            "oauth2" => Some(SecuritySchemeKind::OAuth2),
            "apiKey" | "httpApiKey" => Some(SecuritySchemeKind::ApiKey),
            "http" | "userPassword" => Some(SecuritySchemeKind::Http),
            "openIdConnect" => Some(SecuritySchemeKind::OpenIdConnect),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecuritySchemeKind::OAuth2 => "oauth2",
            SecuritySchemeKind::ApiKey => "apiKey",
            SecuritySchemeKind::Http => "http",
            SecuritySchemeKind::OpenIdConnect => "openIdConnect",
        }
    }
}

/// Where an API key travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Query,
    Header,
    Cookie,
}

impl ApiKeyLocation {
    pub fn parse(value: &str) -> Option<ApiKeyLocation> {
        match value {
            "query" => Some(ApiKeyLocation::Query),
            "header" => Some(ApiKeyLocation::Header),
            "cookie" => Some(ApiKeyLocation::Cookie),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKeyLocation::Query => "query",
            ApiKeyLocation::Header => "header",
            ApiKeyLocation::Cookie => "cookie",
        }
    }
}

/// A single OAuth2 flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthFlow {
    /// `implicit`, `password`, `clientCredentials` or `authorizationCode`.
    pub flow: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

/// A declared security scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScheme {
    pub name: String,
    pub kind: SecuritySchemeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<ApiKeyLocation>,
    /// Header, query or cookie name carrying an API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_name: Option<String>,
    /// HTTP auth scheme such as `bearer` or `basic`, lowercased.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_format: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flows: Vec<OAuthFlow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_id_connect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SecurityScheme {
    pub fn new(name: impl Into<String>, kind: SecuritySchemeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            location: None,
            parameter_name: None,
            scheme: None,
            bearer_format: None,
            flows: Vec::new(),
            open_id_connect_url: None,
            description: None,
        }
    }

    pub fn is_http_scheme(&self, scheme: &str) -> bool {
        self.kind == SecuritySchemeKind::Http
            && self
                .scheme
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(scheme))
    }
}

/// A security requirement: scheme name → required scopes.
pub type SecurityRequirement = IndexMap<String, Vec<String>>;
