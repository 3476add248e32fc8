//! Helpers shared by the format parsers.

use log::warn;
use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::model::{
    ApiKeyLocation, OAuthFlow, SecurityRequirement, SecurityScheme, SecuritySchemeKind, Server,
    SpecFormat,
};

/// Collects every missing top-level field before failing, so a single
/// validation error reports all of them.
pub(crate) struct RequiredFields {
    format: SpecFormat,
    missing: Vec<String>,
}

impl RequiredFields {
    pub fn new(format: SpecFormat) -> Self {
        Self {
            format,
            missing: Vec::new(),
        }
    }

    /// A string (or numeric) scalar under `key`.
    pub fn scalar(&mut self, parent: Option<&Value>, key: &str, label: &str) -> Option<String> {
        let found = parent.and_then(|p| p.get(key)).and_then(scalar_string);
        match found {
            Some(s) if !s.trim().is_empty() => Some(s),
            _ => {
                self.missing.push(label.to_string());
                None
            }
        }
    }

    pub fn object<'a>(
        &mut self,
        parent: Option<&'a Value>,
        key: &str,
        label: &str,
    ) -> Option<&'a Map<String, Value>> {
        let found = parent.and_then(|p| p.get(key)).and_then(Value::as_object);
        if found.is_none() {
            self.missing.push(label.to_string());
        }
        found
    }

    pub fn array<'a>(
        &mut self,
        parent: Option<&'a Value>,
        key: &str,
        label: &str,
    ) -> Option<&'a Vec<Value>> {
        let found = parent.and_then(|p| p.get(key)).and_then(Value::as_array);
        if found.is_none() {
            self.missing.push(label.to_string());
        }
        found
    }

    pub fn finish(self) -> Result<(), ParseError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(ParseError::Validation {
                format: self.format,
                missing: self.missing,
            })
        }
    }
}

/// Read a scalar as a string. YAML turns `version: 1.0` into a float, so
/// numbers are accepted too.
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

pub(crate) fn bool_field(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Check the major version of a format marker such as `openapi: 3.1.0`.
pub(crate) fn check_major(
    format: SpecFormat,
    version: &str,
    supported_major: &str,
) -> Result<(), ParseError> {
    let major = version.trim().split('.').next().unwrap_or_default();
    if major == supported_major {
        Ok(())
    } else {
        Err(ParseError::UnsupportedVersion {
            format,
            version: version.to_string(),
        })
    }
}

/// Choose the preferred media type: `application/json`, then any `+json`
/// type, then the first declared one.
pub(crate) fn pick_media_type(content: &Map<String, Value>) -> Option<(&String, &Value)> {
    content
        .get_key_value("application/json")
        .or_else(|| content.iter().find(|(ct, _)| ct.ends_with("+json")))
        .or_else(|| content.iter().next())
}

pub(crate) fn parse_security_requirements(value: Option<&Value>) -> Vec<SecurityRequirement> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|req| {
            req.iter()
                .map(|(name, scopes)| (name.clone(), string_list(Some(scopes))))
                .collect()
        })
        .collect()
}

const FLOW_KEYS: [&str; 4] = [
    "implicit",
    "password",
    "clientCredentials",
    "authorizationCode",
];

/// Parse a `securitySchemes` map shared by OpenAPI and AsyncAPI.
pub(crate) fn parse_security_schemes(schemes: Option<&Map<String, Value>>) -> Vec<SecurityScheme> {
    let Some(schemes) = schemes else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(schemes.len());
    for (name, def) in schemes {
        let declared = def.get("type").and_then(Value::as_str).unwrap_or_default();
        let Some(kind) = SecuritySchemeKind::parse(declared) else {
            warn!("skipping security scheme '{name}' with unsupported type '{declared}'");
            continue;
        };
        let mut scheme = SecurityScheme::new(name.clone(), kind);
        scheme.location = def
            .get("in")
            .and_then(Value::as_str)
            .and_then(ApiKeyLocation::parse);
        scheme.parameter_name = str_field(def, "name");
        scheme.scheme = str_field(def, "scheme").map(|s| s.to_ascii_lowercase());
        if declared == "userPassword" && scheme.scheme.is_none() {
            scheme.scheme = Some("basic".to_string());
        }
        scheme.bearer_format = str_field(def, "bearerFormat");
        scheme.open_id_connect_url = str_field(def, "openIdConnectUrl");
        scheme.description = str_field(def, "description");
        if let Some(flows) = def.get("flows") {
            for key in FLOW_KEYS {
                let Some(flow) = flows.get(key) else {
                    continue;
                };
                scheme.flows.push(OAuthFlow {
                    flow: key.to_string(),
                    authorization_url: str_field(flow, "authorizationUrl"),
                    token_url: str_field(flow, "tokenUrl"),
                    refresh_url: str_field(flow, "refreshUrl"),
                    scopes: flow
                        .get("scopes")
                        .and_then(Value::as_object)
                        .map(|s| s.keys().cloned().collect())
                        .unwrap_or_default(),
                });
            }
        }
        out.push(scheme);
    }
    out
}

/// OpenAPI lists servers as an array, AsyncAPI 2.x as a name-keyed map.
pub(crate) fn parse_servers(value: Option<&Value>) -> Vec<Server> {
    let server = |v: &Value| {
        str_field(v, "url").map(|url| Server {
            url,
            description: str_field(v, "description"),
        })
    };
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(server).collect(),
        Some(Value::Object(map)) => map.values().filter_map(server).collect(),
        _ => Vec::new(),
    }
}
