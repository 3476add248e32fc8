pub mod metrics;
pub mod strategy;

pub use metrics::{ComplexityTier, SpecMetrics, analyze};
pub use strategy::{OptimizationStrategy, select};
