use serde::{Deserialize, Serialize};

use super::metrics::{ComplexityTier, SpecMetrics};

/// Endpoint count above which work is chunked, parallelized and indexed.
pub const CHUNKING_THRESHOLD: usize = 500;
/// Endpoint count above which model normalization is memoized.
pub const CACHING_THRESHOLD: usize = 200;

/// Which processing optimizations to apply to an API description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationStrategy {
    pub use_chunking: bool,
    pub use_streaming: bool,
    pub use_caching: bool,
    pub use_parallelization: bool,
    pub use_compression: bool,
    pub use_indexing: bool,
}

impl OptimizationStrategy {
    /// Pick optimizations from measured scale.
    pub fn select(metrics: &SpecMetrics) -> Self {
        let endpoints = metrics.endpoint_count;
        let tier = metrics.complexity_tier;
        Self {
            use_chunking: endpoints > CHUNKING_THRESHOLD,
            use_streaming: tier == ComplexityTier::XLarge,
            use_caching: endpoints > CACHING_THRESHOLD,
            use_parallelization: endpoints > CHUNKING_THRESHOLD,
            use_compression: tier >= ComplexityTier::Large,
            use_indexing: endpoints > CHUNKING_THRESHOLD,
        }
    }

    /// Names of the enabled optimizations, for summaries.
    pub fn enabled(&self) -> Vec<&'static str> {
        [
            ("chunking", self.use_chunking),
            ("streaming", self.use_streaming),
            ("caching", self.use_caching),
            ("parallelization", self.use_parallelization),
            ("compression", self.use_compression),
            ("indexing", self.use_indexing),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect()
    }
}

pub fn select(metrics: &SpecMetrics) -> OptimizationStrategy {
    OptimizationStrategy::select(metrics)
}
