use serde::{Deserialize, Serialize};

use crate::model::UnifiedSpec;

const MIB: usize = 1024 * 1024;

/// Per-model cost added to the processing estimate.
const MODEL_COST_MS: u64 = 10;

/// Size class of an API description. Ordered from smallest to largest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    Small,
    Medium,
    Large,
    XLarge,
}

impl ComplexityTier {
    /// Classify by endpoint count and serialized size. The first matching
    /// tier from the top wins.
    pub fn classify(endpoints: usize, bytes: usize) -> ComplexityTier {
        if endpoints > 1000 || bytes > 10 * MIB {
            ComplexityTier::XLarge
        } else if endpoints > 500 || bytes > 5 * MIB {
            ComplexityTier::Large
        } else if endpoints > 100 || bytes > MIB {
            ComplexityTier::Medium
        } else {
            ComplexityTier::Small
        }
    }

    /// Estimated milliseconds of work per endpoint.
    pub fn endpoint_cost_ms(&self) -> u64 {
        match self {
            ComplexityTier::XLarge => 50,
            ComplexityTier::Large => 30,
            ComplexityTier::Medium | ComplexityTier::Small => 20,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityTier::Small => "small",
            ComplexityTier::Medium => "medium",
            ComplexityTier::Large => "large",
            ComplexityTier::XLarge => "xlarge",
        }
    }
}

impl std::fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scale measurements of a parsed API description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecMetrics {
    pub endpoint_count: usize,
    pub model_count: usize,
    pub total_size_bytes: usize,
    pub complexity_tier: ComplexityTier,
    pub estimated_processing_time_ms: u64,
}

impl SpecMetrics {
    pub fn from_counts(endpoint_count: usize, model_count: usize, total_size_bytes: usize) -> Self {
        let complexity_tier = ComplexityTier::classify(endpoint_count, total_size_bytes);
        let estimated_processing_time_ms = endpoint_count as u64
            * complexity_tier.endpoint_cost_ms()
            + model_count as u64 * MODEL_COST_MS;
        Self {
            endpoint_count,
            model_count,
            total_size_bytes,
            complexity_tier,
            estimated_processing_time_ms,
        }
    }
}

/// Measure a parsed API description. Every endpoint is one method on one path, so
/// the endpoint count is the sum of methods over all paths. The size is the
/// length of the spec serialized as JSON.
pub fn analyze(spec: &UnifiedSpec) -> SpecMetrics {
    let bytes = serde_json::to_vec(spec).map(|b| b.len()).unwrap_or(0);
    SpecMetrics::from_counts(spec.endpoints.len(), spec.schemas.len(), bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries_by_endpoints() {
        assert_eq!(ComplexityTier::classify(100, 0), ComplexityTier::Small);
        assert_eq!(ComplexityTier::classify(101, 0), ComplexityTier::Medium);
        assert_eq!(ComplexityTier::classify(500, 0), ComplexityTier::Medium);
        assert_eq!(ComplexityTier::classify(501, 0), ComplexityTier::Large);
        assert_eq!(ComplexityTier::classify(1000, 0), ComplexityTier::Large);
        assert_eq!(ComplexityTier::classify(1001, 0), ComplexityTier::XLarge);
    }

    #[test]
    fn test_tier_boundaries_by_bytes() {
        assert_eq!(ComplexityTier::classify(0, MIB), ComplexityTier::Small);
        assert_eq!(ComplexityTier::classify(0, MIB + 1), ComplexityTier::Medium);
        assert_eq!(ComplexityTier::classify(0, 5 * MIB + 1), ComplexityTier::Large);
        assert_eq!(ComplexityTier::classify(0, 10 * MIB), ComplexityTier::Large);
        assert_eq!(ComplexityTier::classify(0, 10 * MIB + 1), ComplexityTier::XLarge);
    }

    #[test]
    fn test_tier_is_monotonic() {
        let mut previous = ComplexityTier::Small;
        for endpoints in (0..1500).step_by(7) {
            let tier = ComplexityTier::classify(endpoints, 0);
            assert!(tier >= previous);
            previous = tier;
        }
    }

    #[test]
    fn test_estimate() {
        let m = SpecMetrics::from_counts(1200, 50, 0);
        assert_eq!(m.complexity_tier, ComplexityTier::XLarge);
        assert_eq!(m.estimated_processing_time_ms, 1200 * 50 + 50 * 10);

        let m = SpecMetrics::from_counts(10, 3, 0);
        assert_eq!(m.estimated_processing_time_ms, 10 * 20 + 3 * 10);
    }

    #[test]
    fn test_tier_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ComplexityTier::XLarge).unwrap(),
            "\"xlarge\""
        );
    }
}
