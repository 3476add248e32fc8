//! Heuristic pattern detection over a parsed spec.
//!
//! Each detector walks an ordered rule table of `(kind, confidence,
//! predicate)` entries. Every matching rule contributes a pattern and
//! results come back sorted by descending confidence, ties in table order.
//! Detectors never fail: a spec with no signals yields an empty list.

pub mod auth;
pub mod pagination;

use serde::Serialize;

use crate::model::UnifiedSpec;

pub use auth::{AuthHeader, AuthKind, AuthPattern, detect_auth_patterns, detect_auth_patterns_with};
pub use pagination::{
    EndpointPagination, PaginationKind, PaginationPattern, detect_all_pagination,
    detect_pagination_patterns,
};

/// Everything the detectors found in one spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionReport {
    pub auth: Vec<AuthPattern>,
    pub pagination: Vec<EndpointPagination>,
}

/// Run every detector.
pub fn detect_patterns(spec: &UnifiedSpec, extra_auth_keywords: &[String]) -> DetectionReport {
    DetectionReport {
        auth: detect_auth_patterns_with(spec, extra_auth_keywords),
        pagination: detect_all_pagination(spec),
    }
}
