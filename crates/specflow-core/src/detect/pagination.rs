use serde::Serialize;

use crate::model::{Endpoint, ParameterLocation, SchemaType, UnifiedSpec};
use crate::transform::SchemaResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationKind {
    Offset,
    Cursor,
    CompoundCursor,
    Token,
    Timestamp,
    /// Bookmark-style resumption, or offset and cursor signals together.
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginationPattern {
    pub kind: PaginationKind,
    /// Query parameters that produced the match.
    pub parameters: Vec<String>,
    /// Response properties that produced the match, dotted for nested ones.
    pub response_fields: Vec<String>,
    pub evidence: Vec<String>,
    pub confidence: f32,
}

/// The pagination patterns found on one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointPagination {
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    pub patterns: Vec<PaginationPattern>,
}

/// Names a rule reacts to, compared after lowercasing and dropping `_`/`-`.
struct Terms {
    query: &'static [&'static str],
    response: &'static [&'static str],
    /// Whether response properties alone are enough to match.
    response_alone: bool,
}

const OFFSET: Terms = Terms {
    query: &["offset", "skip", "page", "pagenumber", "pagenum", "startindex"],
    response: &["offset", "totalpages", "pagecount", "totalcount", "total"],
    response_alone: false,
};

const PAGE_SIZE: &[&str] = &["limit", "perpage", "pagesize", "size", "count", "top", "maxresults"];

const CURSOR: Terms = Terms {
    query: &["cursor", "after", "before", "startingafter", "endingbefore", "pagecursor"],
    response: &[
        "nextcursor",
        "prevcursor",
        "previouscursor",
        "cursor",
        "endcursor",
        "startcursor",
        "hasnextpage",
        "pageinfo",
    ],
    response_alone: true,
};

const TOKEN: Terms = Terms {
    query: &[
        "pagetoken",
        "nexttoken",
        "nextpagetoken",
        "continuationtoken",
        "continuation",
        "paginationtoken",
        "marker",
    ],
    response: &[
        "nextpagetoken",
        "nexttoken",
        "continuationtoken",
        "nextmarker",
    ],
    response_alone: true,
};

const TIMESTAMP: Terms = Terms {
    query: &[
        "since",
        "until",
        "starttime",
        "endtime",
        "startdate",
        "enddate",
        "fromdate",
        "todate",
        "updatedsince",
        "modifiedsince",
        "updatedafter",
        "updatedbefore",
        "createdafter",
        "createdbefore",
    ],
    response: &[],
    response_alone: false,
};

const BOOKMARK: Terms = Terms {
    query: &["bookmark", "anchor", "resumefrom", "searchafter", "seek", "keyset"],
    response: &["bookmark", "nextbookmark", "searchafter", "resumetoken"],
    response_alone: true,
};

/// Prefixes of the per-field parts of a compound cursor (`after_id`,
/// `after_created_at`, `since_id`, ...).
const COMPOUND_PREFIXES: &[&str] = &["after", "before", "since", "last", "startingafter"];

struct PaginationRule {
    kind: PaginationKind,
    confidence: f32,
    detect: fn(&Signals) -> Option<Hit>,
}

/// Tried in order; every matching rule contributes a pattern.
const PAGINATION_RULES: &[PaginationRule] = &[
    PaginationRule {
        kind: PaginationKind::Offset,
        confidence: 0.9,
        detect: offset_hit,
    },
    PaginationRule {
        kind: PaginationKind::Cursor,
        confidence: 0.85,
        detect: |s| s.matching(&CURSOR),
    },
    PaginationRule {
        kind: PaginationKind::CompoundCursor,
        confidence: 0.8,
        detect: compound_hit,
    },
    PaginationRule {
        kind: PaginationKind::Token,
        confidence: 0.85,
        detect: |s| s.matching(&TOKEN),
    },
    PaginationRule {
        kind: PaginationKind::Timestamp,
        confidence: 0.7,
        detect: |s| s.matching(&TIMESTAMP),
    },
    PaginationRule {
        kind: PaginationKind::Hybrid,
        confidence: 0.75,
        detect: hybrid_hit,
    },
];

#[derive(Debug, Default)]
struct Hit {
    parameters: Vec<String>,
    response_fields: Vec<String>,
    notes: Vec<String>,
}

/// Query parameter names and response property paths of one endpoint.
struct Signals {
    /// `(normalized, declared)`
    query: Vec<(String, String)>,
    /// `(normalized leaf, dotted path)`
    response: Vec<(String, String)>,
}

impl Signals {
    fn collect(endpoint: &Endpoint, resolver: Option<&SchemaResolver<'_>>) -> Self {
        let query = endpoint
            .parameters_in(ParameterLocation::Query)
            .map(|p| (fold(&p.name), p.name.clone()))
            .collect();

        let mut response = Vec::new();
        if let Some(schema) = endpoint.success_response().and_then(|r| r.schema.as_ref()) {
            let schema = match resolver {
                Some(resolver) => resolver.resolve_depth(schema, 1),
                None => schema.clone(),
            };
            if let Some(body) = schema.body() {
                for (name, property) in &body.properties {
                    response.push((fold(name), name.clone()));
                    let Some(nested) = property.body() else {
                        continue;
                    };
                    if nested.schema_type.is_some_and(|t| t != SchemaType::Object) {
                        continue;
                    }
                    for child in nested.properties.keys() {
                        response.push((fold(child), format!("{name}.{child}")));
                    }
                }
            }
        }
        Self { query, response }
    }

    fn query_named(&self, terms: &[&str]) -> Vec<String> {
        self.query
            .iter()
            .filter(|(folded, _)| terms.contains(&folded.as_str()))
            .map(|(_, declared)| declared.clone())
            .collect()
    }

    fn response_named(&self, terms: &[&str]) -> Vec<String> {
        self.response
            .iter()
            .filter(|(folded, _)| terms.contains(&folded.as_str()))
            .map(|(_, path)| path.clone())
            .collect()
    }

    fn matching(&self, terms: &Terms) -> Option<Hit> {
        let parameters = self.query_named(terms.query);
        let response_fields = self.response_named(terms.response);
        if parameters.is_empty() && !(terms.response_alone && !response_fields.is_empty()) {
            return None;
        }
        Some(Hit {
            parameters,
            response_fields,
            notes: Vec::new(),
        })
    }
}

fn offset_hit(signals: &Signals) -> Option<Hit> {
    let mut hit = signals.matching(&OFFSET)?;
    hit.parameters.extend(signals.query_named(PAGE_SIZE));
    Some(hit)
}

fn compound_hit(signals: &Signals) -> Option<Hit> {
    let parameters: Vec<String> = signals
        .query
        .iter()
        .filter(|(folded, _)| {
            COMPOUND_PREFIXES
                .iter()
                .any(|prefix| folded.len() > prefix.len() && folded.starts_with(prefix))
        })
        .map(|(_, declared)| declared.clone())
        .collect();
    if parameters.len() < 2 {
        return None;
    }
    Some(Hit {
        parameters,
        notes: vec!["cursor split across several keys".to_string()],
        ..Hit::default()
    })
}

fn hybrid_hit(signals: &Signals) -> Option<Hit> {
    if let Some(hit) = signals.matching(&BOOKMARK) {
        return Some(hit);
    }
    let offset = signals.matching(&OFFSET)?;
    let cursor = signals.matching(&CURSOR)?;
    let mut parameters = offset.parameters;
    parameters.extend(cursor.parameters);
    let mut response_fields = offset.response_fields;
    response_fields.extend(cursor.response_fields);
    Some(Hit {
        parameters,
        response_fields,
        notes: vec!["offset and cursor signals combined".to_string()],
    })
}

fn fold(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Detect pagination patterns on one endpoint. Results are sorted by
/// descending confidence; equal confidences keep rule order. Response
/// schemas held as references are not followed here; see
/// [`detect_all_pagination`].
pub fn detect_pagination_patterns(endpoint: &Endpoint) -> Vec<PaginationPattern> {
    detect_with(endpoint, None)
}

/// Pagination patterns for every endpoint with at least one match.
/// Response schemas left as references are followed through `spec`.
pub fn detect_all_pagination(spec: &UnifiedSpec) -> Vec<EndpointPagination> {
    let resolver = SchemaResolver::new(&spec.schemas);
    spec.endpoints
        .iter()
        .filter_map(|endpoint| {
            let patterns = detect_with(endpoint, Some(&resolver));
            if patterns.is_empty() {
                return None;
            }
            Some(EndpointPagination {
                operation: format!("{} {}", endpoint.method.as_str(), endpoint.path),
                operation_id: endpoint.operation_id.clone(),
                patterns,
            })
        })
        .collect()
}

fn detect_with(endpoint: &Endpoint, resolver: Option<&SchemaResolver<'_>>) -> Vec<PaginationPattern> {
    let signals = Signals::collect(endpoint, resolver);
    if signals.query.is_empty() && signals.response.is_empty() {
        return Vec::new();
    }

    let mut patterns: Vec<PaginationPattern> = PAGINATION_RULES
        .iter()
        .filter_map(|rule| {
            let hit = (rule.detect)(&signals)?;
            let mut evidence: Vec<String> = hit
                .parameters
                .iter()
                .map(|p| format!("query parameter '{p}'"))
                .chain(
                    hit.response_fields
                        .iter()
                        .map(|f| format!("response field '{f}'")),
                )
                .collect();
            evidence.extend(hit.notes);
            Some(PaginationPattern {
                kind: rule.kind,
                parameters: hit.parameters,
                response_fields: hit.response_fields,
                evidence,
                confidence: rule.confidence,
            })
        })
        .collect();

    patterns.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Method, Parameter, Response, SchemaBody, SchemaNode};

    fn endpoint(query: &[&str]) -> Endpoint {
        let mut endpoint = Endpoint::new("/items", Method::Get);
        for name in query {
            endpoint
                .parameters
                .push(Parameter::new(*name, ParameterLocation::Query));
        }
        endpoint
    }

    fn with_response(mut endpoint: Endpoint, schema: SchemaNode) -> Endpoint {
        endpoint.responses.push(Response {
            status: "200".into(),
            description: None,
            content_type: Some("application/json".into()),
            schema: Some(schema),
        });
        endpoint
    }

    fn object(properties: &[(&str, SchemaNode)]) -> SchemaNode {
        let mut body = SchemaBody::of_type(SchemaType::Object);
        for (name, schema) in properties {
            body.properties.insert(name.to_string(), schema.clone());
        }
        SchemaNode::resolved(body)
    }

    fn kinds(patterns: &[PaginationPattern]) -> Vec<(PaginationKind, f32)> {
        patterns.iter().map(|p| (p.kind, p.confidence)).collect()
    }

    #[test]
    fn test_offset_limit() {
        let patterns = detect_pagination_patterns(&endpoint(&["offset", "limit", "q"]));
        assert_eq!(kinds(&patterns), vec![(PaginationKind::Offset, 0.9)]);
        assert_eq!(patterns[0].parameters, vec!["offset", "limit"]);
    }

    #[test]
    fn test_cursor_from_nested_response() {
        let page_info = object(&[("endCursor", SchemaNode::of_type(SchemaType::String))]);
        let schema = object(&[
            ("data", SchemaNode::of_type(SchemaType::Array)),
            ("meta", page_info),
        ]);
        let patterns = detect_pagination_patterns(&with_response(endpoint(&[]), schema));
        assert_eq!(kinds(&patterns), vec![(PaginationKind::Cursor, 0.85)]);
        assert_eq!(patterns[0].response_fields, vec!["meta.endCursor"]);
    }

    #[test]
    fn test_token_and_timestamp_sorted() {
        let patterns = detect_pagination_patterns(&endpoint(&["updated_since", "pageToken"]));
        assert_eq!(
            kinds(&patterns),
            vec![(PaginationKind::Token, 0.85), (PaginationKind::Timestamp, 0.7)]
        );
    }

    #[test]
    fn test_compound_cursor_needs_two_keys() {
        assert!(detect_pagination_patterns(&endpoint(&["after_id"])).is_empty());
        let patterns = detect_pagination_patterns(&endpoint(&["after_id", "after_created_at"]));
        assert_eq!(kinds(&patterns), vec![(PaginationKind::CompoundCursor, 0.8)]);
    }

    #[test]
    fn test_offset_and_cursor_are_hybrid() {
        let patterns = detect_pagination_patterns(&endpoint(&["page", "cursor"]));
        assert_eq!(
            kinds(&patterns),
            vec![
                (PaginationKind::Offset, 0.9),
                (PaginationKind::Cursor, 0.85),
                (PaginationKind::Hybrid, 0.75),
            ]
        );
    }

    #[test]
    fn test_detect_all_follows_response_references() {
        let mut spec = UnifiedSpec::new(crate::model::SpecFormat::OpenApi, "t", "1");
        spec.schemas.insert(
            "PageInfo".into(),
            object(&[("nextCursor", SchemaNode::of_type(SchemaType::String))]),
        );
        spec.schemas.insert(
            "ItemPage".into(),
            object(&[("page", SchemaNode::reference("PageInfo"))]),
        );
        spec.endpoints.push(with_response(
            endpoint(&[]),
            SchemaNode::reference("ItemPage"),
        ));

        assert!(detect_pagination_patterns(&spec.endpoints[0]).is_empty());
        let all = detect_all_pagination(&spec);
        assert_eq!(kinds(&all[0].patterns), vec![(PaginationKind::Cursor, 0.85)]);
        assert_eq!(all[0].patterns[0].response_fields, vec!["page.nextCursor"]);
    }

    #[test]
    fn test_detect_all_skips_unpaginated() {
        let mut spec = UnifiedSpec::new(crate::model::SpecFormat::OpenApi, "t", "1");
        spec.endpoints.push(endpoint(&["q"]));
        let mut paged = endpoint(&["bookmark"]);
        paged.path = "/paged".into();
        paged.operation_id = Some("listPaged".into());
        spec.endpoints.push(paged);

        let all = detect_all_pagination(&spec);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].operation, "GET /paged");
        assert_eq!(all[0].patterns[0].kind, PaginationKind::Hybrid);
    }
}
