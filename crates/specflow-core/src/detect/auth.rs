use log::debug;
use serde::Serialize;

use crate::model::{
    ApiKeyLocation, ParameterLocation, SecurityScheme, SecuritySchemeKind, UnifiedSpec,
};

/// Substrings that mark a header as carrying credentials.
pub const AUTH_HEADER_VOCABULARY: &[&str] = &[
    "auth",
    "token",
    "api-key",
    "apikey",
    "api_key",
    "x-key",
    "secret",
    "signature",
    "session",
    "credential",
];

/// Keywords that mark a scheme as request signing.
pub const HMAC_KEYWORDS: &[&str] = &["hmac", "signature", "sha256", "sha-256", "signed"];

pub const CUSTOM_HEADER_CONFIDENCE: f32 = 0.6;
pub const HYBRID_CONFIDENCE: f32 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    OAuth2,
    ApiKey,
    Bearer,
    Basic,
    Custom,
    Hybrid,
}

/// A credential-bearing header merged across endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthHeader {
    pub name: String,
    pub occurrences: usize,
    /// `METHOD path` of each endpoint declaring it.
    pub endpoints: Vec<String>,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthPattern {
    pub kind: AuthKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<ApiKeyLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<AuthHeader>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flows: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    pub evidence: Vec<String>,
    pub confidence: f32,
}

impl AuthPattern {
    fn new(kind: AuthKind, confidence: f32) -> Self {
        Self {
            kind,
            scheme_name: None,
            location: None,
            parameter_name: None,
            headers: Vec::new(),
            flows: Vec::new(),
            scopes: Vec::new(),
            evidence: Vec::new(),
            confidence,
        }
    }
}

struct SchemeRule {
    kind: AuthKind,
    confidence: f32,
    matches: fn(&SecurityScheme) -> bool,
}

/// Declared scheme classification, tried in order.
const SCHEME_RULES: &[SchemeRule] = &[
    SchemeRule {
        kind: AuthKind::OAuth2,
        confidence: 0.9,
        matches: |s| s.kind == SecuritySchemeKind::OAuth2,
    },
    SchemeRule {
        kind: AuthKind::ApiKey,
        confidence: 0.8,
        matches: |s| s.kind == SecuritySchemeKind::ApiKey,
    },
    SchemeRule {
        kind: AuthKind::Bearer,
        confidence: 0.85,
        matches: |s| s.is_http_scheme("bearer"),
    },
    SchemeRule {
        kind: AuthKind::Basic,
        confidence: 0.9,
        matches: |s| s.is_http_scheme("basic"),
    },
];

/// Detect authentication patterns with the built-in header vocabulary.
pub fn detect_auth_patterns(spec: &UnifiedSpec) -> Vec<AuthPattern> {
    detect_auth_patterns_with(spec, &[])
}

/// Detect authentication patterns, extending the header vocabulary with
/// `extra_keywords`. Results are sorted by descending confidence; equal
/// confidences keep detection order.
pub fn detect_auth_patterns_with(spec: &UnifiedSpec, extra_keywords: &[String]) -> Vec<AuthPattern> {
    let mut patterns: Vec<AuthPattern> = spec
        .security_schemes
        .iter()
        .filter_map(classify_scheme)
        .collect();

    if let Some(custom) = custom_header_pattern(spec, extra_keywords) {
        patterns.push(custom);
    }
    if let Some(hybrid) = hybrid_pattern(&spec.security_schemes) {
        patterns.push(hybrid);
    }

    patterns.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    patterns
}

fn classify_scheme(scheme: &SecurityScheme) -> Option<AuthPattern> {
    let Some(rule) = SCHEME_RULES.iter().find(|r| (r.matches)(scheme)) else {
        debug!(
            "security scheme '{}' ({}) matches no auth rule",
            scheme.name,
            scheme.kind.as_str()
        );
        return None;
    };
    let mut pattern = AuthPattern::new(rule.kind, rule.confidence);
    pattern.scheme_name = Some(scheme.name.clone());
    pattern.location = scheme.location;
    pattern.parameter_name = scheme.parameter_name.clone();
    pattern.evidence.push(format!(
        "declared {} scheme '{}'",
        scheme.kind.as_str(),
        scheme.name
    ));
    for flow in &scheme.flows {
        pattern.flows.push(flow.flow.clone());
        for scope in &flow.scopes {
            if !pattern.scopes.contains(scope) {
                pattern.scopes.push(scope.clone());
            }
        }
    }
    Some(pattern)
}

fn custom_header_pattern(spec: &UnifiedSpec, extra_keywords: &[String]) -> Option<AuthPattern> {
    let extra: Vec<String> = extra_keywords.iter().map(|k| k.to_ascii_lowercase()).collect();
    let is_auth_header = |lower: &str| {
        AUTH_HEADER_VOCABULARY.iter().any(|term| lower.contains(term))
            || extra.iter().any(|term| !term.is_empty() && lower.contains(term.as_str()))
    };

    let mut headers: Vec<AuthHeader> = Vec::new();
    for endpoint in &spec.endpoints {
        let operation = format!("{} {}", endpoint.method.as_str(), endpoint.path);
        for param in endpoint.parameters_in(ParameterLocation::Header) {
            let lower = param.name.to_ascii_lowercase();
            if !is_auth_header(&lower) {
                continue;
            }
            match headers
                .iter_mut()
                .find(|h| h.name.eq_ignore_ascii_case(&param.name))
            {
                Some(header) => {
                    header.occurrences += 1;
                    header.required |= param.required;
                    if !header.endpoints.contains(&operation) {
                        header.endpoints.push(operation.clone());
                    }
                }
                None => headers.push(AuthHeader {
                    name: param.name.clone(),
                    occurrences: 1,
                    endpoints: vec![operation.clone()],
                    required: param.required,
                }),
            }
        }
    }
    if headers.is_empty() {
        return None;
    }

    let mut pattern = AuthPattern::new(AuthKind::Custom, CUSTOM_HEADER_CONFIDENCE);
    pattern.location = Some(ApiKeyLocation::Header);
    pattern.evidence = headers
        .iter()
        .map(|h| format!("header '{}' on {} endpoint(s)", h.name, h.endpoints.len()))
        .collect();
    pattern.headers = headers;
    Some(pattern)
}

fn hybrid_pattern(schemes: &[SecurityScheme]) -> Option<AuthPattern> {
    let oauth = schemes
        .iter()
        .find(|s| s.kind == SecuritySchemeKind::OAuth2)?;
    let signing = schemes
        .iter()
        .filter(|s| s.name != oauth.name)
        .find(|s| is_hmac_like(s))?;

    let mut pattern = AuthPattern::new(AuthKind::Hybrid, HYBRID_CONFIDENCE);
    pattern.evidence = vec![
        format!("request signing scheme '{}'", signing.name),
        format!("oauth2 scheme '{}'", oauth.name),
    ];
    Some(pattern)
}

/// Whether a scheme's serialized text mentions a signing keyword.
fn is_hmac_like(scheme: &SecurityScheme) -> bool {
    let text = serde_json::to_string(scheme)
        .unwrap_or_default()
        .to_ascii_lowercase();
    HMAC_KEYWORDS.iter().any(|k| text.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Endpoint, Method, OAuthFlow, Parameter, SpecFormat};

    fn scheme(name: &str, kind: SecuritySchemeKind) -> SecurityScheme {
        SecurityScheme::new(name, kind)
    }

    #[test]
    fn test_rule_table_confidences() {
        let mut spec = UnifiedSpec::new(SpecFormat::OpenApi, "t", "1");
        let mut key = scheme("key", SecuritySchemeKind::ApiKey);
        key.location = Some(ApiKeyLocation::Header);
        key.parameter_name = Some("X-API-Key".into());
        let mut bearer = scheme("jwt", SecuritySchemeKind::Http);
        bearer.scheme = Some("bearer".into());
        let mut oauth = scheme("oauth", SecuritySchemeKind::OAuth2);
        oauth.flows.push(OAuthFlow {
            flow: "clientCredentials".into(),
            authorization_url: None,
            token_url: Some("https://auth.example.com/token".into()),
            refresh_url: None,
            scopes: vec!["read".into()],
        });
        spec.security_schemes = vec![key, bearer, oauth];

        let patterns = detect_auth_patterns(&spec);
        let kinds: Vec<_> = patterns.iter().map(|p| (p.kind, p.confidence)).collect();
        assert_eq!(
            kinds,
            vec![
                (AuthKind::OAuth2, 0.9),
                (AuthKind::Bearer, 0.85),
                (AuthKind::ApiKey, 0.8),
            ]
        );
        assert_eq!(patterns[0].scopes, vec!["read"]);
    }

    #[test]
    fn test_declared_api_key_header_is_still_scanned() {
        let mut spec = UnifiedSpec::new(SpecFormat::OpenApi, "t", "1");
        let mut key = scheme("key", SecuritySchemeKind::ApiKey);
        key.location = Some(ApiKeyLocation::Header);
        key.parameter_name = Some("X-API-Key".into());
        spec.security_schemes.push(key);
        for path in ["/a", "/b", "/c"] {
            let mut endpoint = Endpoint::new(path, Method::Get);
            endpoint
                .parameters
                .push(Parameter::new("x-api-key", ParameterLocation::Header));
            spec.endpoints.push(endpoint);
        }

        let patterns = detect_auth_patterns(&spec);
        let kinds: Vec<AuthKind> = patterns.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![AuthKind::ApiKey, AuthKind::Custom]);
        assert_eq!(patterns[1].headers.len(), 1);
        assert_eq!(patterns[1].headers[0].occurrences, 3);
    }

    #[test]
    fn test_extra_keywords() {
        let mut spec = UnifiedSpec::new(SpecFormat::OpenApi, "t", "1");
        let mut endpoint = Endpoint::new("/a", Method::Get);
        endpoint
            .parameters
            .push(Parameter::new("X-Tenant-Pass", ParameterLocation::Header));
        spec.endpoints.push(endpoint);

        assert!(detect_auth_patterns(&spec).is_empty());
        let patterns = detect_auth_patterns_with(&spec, &["pass".to_string()]);
        assert_eq!(patterns[0].kind, AuthKind::Custom);
    }

    #[test]
    fn test_hybrid_needs_both() {
        let mut signing = scheme("signed", SecuritySchemeKind::ApiKey);
        signing.parameter_name = Some("X-Signature".into());
        signing.description = Some("HMAC-SHA256 of the body".into());
        let mut spec = UnifiedSpec::new(SpecFormat::OpenApi, "t", "1");
        spec.security_schemes = vec![signing.clone()];
        assert!(
            detect_auth_patterns(&spec)
                .iter()
                .all(|p| p.kind != AuthKind::Hybrid)
        );

        spec.security_schemes
            .push(scheme("oauth", SecuritySchemeKind::OAuth2));
        let patterns = detect_auth_patterns(&spec);
        let kinds: Vec<_> = patterns.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![AuthKind::OAuth2, AuthKind::ApiKey, AuthKind::Hybrid]
        );
    }

    #[test]
    fn test_open_id_connect_is_unclassified() {
        let mut spec = UnifiedSpec::new(SpecFormat::OpenApi, "t", "1");
        spec.security_schemes
            .push(scheme("oidc", SecuritySchemeKind::OpenIdConnect));
        assert!(detect_auth_patterns(&spec).is_empty());
    }
}
