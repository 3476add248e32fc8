//! End-to-end ingestion: parse, analyze, choose a strategy, process, detect.

use log::info;
use tokio_util::sync::CancellationToken;

use crate::analyze::{self, OptimizationStrategy, SpecMetrics};
use crate::config::SpecflowConfig;
use crate::detect::{self, DetectionReport};
use crate::error::PipelineError;
use crate::model::RawSpecDocument;
use crate::parse;
use crate::process::{ProcessedSpec, ProgressReporter, SpecProcessor};

/// Everything one ingestion produced.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Measured on the parsed spec, before processing.
    pub metrics: SpecMetrics,
    pub strategy: OptimizationStrategy,
    pub processed: ProcessedSpec,
    /// Run on the processed spec.
    pub detection: DetectionReport,
}

/// Ingest one document.
///
/// A declared format in `config` applies only when the document itself
/// declares none.
pub async fn ingest(
    document: RawSpecDocument,
    config: &SpecflowConfig,
    progress: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<IngestOutcome, PipelineError> {
    let document = match (document.format(), config.format) {
        (None, Some(format)) => document.with_format(format),
        _ => document,
    };
    let spec = parse::parse_document(document)?;
    let metrics = analyze::analyze(&spec);
    let strategy = analyze::select(&metrics);
    info!(
        "{} '{}': {} endpoints, {} models, tier {}, strategy [{}]",
        spec.format,
        spec.title,
        metrics.endpoint_count,
        metrics.model_count,
        metrics.complexity_tier,
        strategy.enabled().join(", ")
    );

    let processor = SpecProcessor::new(config.processing.into());
    let processed = processor.process(spec, &strategy, progress, cancel).await?;
    let detection = detect::detect_patterns(
        &processed.spec,
        &config.detection.extra_auth_keywords,
    );

    Ok(IngestOutcome {
        metrics,
        strategy,
        processed,
        detection,
    })
}
