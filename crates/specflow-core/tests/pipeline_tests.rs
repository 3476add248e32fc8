use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use specflow_core::analyze::ComplexityTier;
use specflow_core::config::SpecflowConfig;
use specflow_core::detect::AuthKind;
use specflow_core::model::SpecFormat;
use specflow_core::process::{ProcessingMode, ProgressEvent, ProgressReporter};
use specflow_core::{PipelineError, ProcessError, RawSpecDocument, ingest};

const PETSTORE: &str = include_str!("fixtures/petstore.yaml");
const GRAPHQL: &str = include_str!("fixtures/graphql-schema.json");

/// An OpenAPI document with `endpoints` GET operations and `models`
/// structurally distinct schemas.
fn synthetic_openapi(endpoints: usize, models: usize) -> String {
    let mut schemas = Map::new();
    for m in 0..models {
        let mut properties = Map::new();
        properties.insert("id".into(), json!({ "type": "integer" }));
        properties.insert(format!("field{m}"), json!({ "type": "string" }));
        schemas.insert(
            format!("Model{m}"),
            json!({
                "type": "object",
                "required": ["id", "id"],
                "properties": properties
            }),
        );
    }
    let mut paths = Map::new();
    for e in 0..endpoints {
        paths.insert(
            format!("/resources{e}/{{id}}"),
            json!({
                "get": {
                    "parameters": [
                        { "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }
                    ],
                    "responses": {
                        "200": {
                            "description": "ok",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": format!("#/components/schemas/Model{}", e % models.max(1)) }
                                }
                            }
                        }
                    }
                }
            }),
        );
    }
    let doc = json!({
        "openapi": "3.0.3",
        "info": { "title": "Synthetic", "version": "1.0.0" },
        "paths": Value::Object(paths),
        "components": { "schemas": Value::Object(schemas) }
    });
    doc.to_string()
}

#[tokio::test]
async fn xlarge_spec_streams_every_endpoint() {
    let document = RawSpecDocument::new(synthetic_openapi(1200, 50));
    let outcome = ingest(
        document,
        &SpecflowConfig::default(),
        &ProgressReporter::silent(),
        &CancellationToken::new(),
    )
    .await
    .expect("ingest succeeds");

    assert_eq!(outcome.metrics.endpoint_count, 1200);
    assert_eq!(outcome.metrics.model_count, 50);
    assert_eq!(outcome.metrics.complexity_tier, ComplexityTier::XLarge);
    assert!(outcome.strategy.use_streaming);
    assert!(outcome.strategy.use_chunking);
    assert!(outcome.strategy.use_parallelization);

    let processed = &outcome.processed;
    assert_eq!(processed.stats.mode, ProcessingMode::Streaming);
    assert_eq!(processed.spec.endpoints.len(), 1200);
    assert_eq!(processed.spec.schemas.len(), 50);
    assert_eq!(processed.stats.items, 1250);

    // Every endpoint comes back normalized and indexed
    let first = &processed.spec.endpoints[0];
    assert_eq!(first.operation_id.as_deref(), Some("getResources0"));
    let index = processed.index.as_ref().expect("indexing is enabled");
    assert_eq!(index.by_operation_id.len(), 1200);

    let model = processed.spec.schemas["Model0"].body().unwrap();
    assert_eq!(model.required, vec!["id"]);
}

#[tokio::test]
async fn large_spec_runs_parallel_batches() {
    let document = RawSpecDocument::new(synthetic_openapi(600, 10));
    let outcome = ingest(
        document,
        &SpecflowConfig::default(),
        &ProgressReporter::silent(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.metrics.complexity_tier, ComplexityTier::Large);
    let stats = &outcome.processed.stats;
    assert_eq!(stats.mode, ProcessingMode::Parallel);
    // Six endpoint chunks and one model chunk, at most four in flight
    assert_eq!(stats.chunks, 7);
    assert_eq!(stats.batches, 4);

    let paths: Vec<&str> = outcome
        .processed
        .spec
        .endpoints
        .iter()
        .map(|e| e.path.as_str())
        .collect();
    let expected: Vec<String> = (0..600).map(|e| format!("/resources{e}/{{id}}")).collect();
    assert_eq!(paths, expected);
}

#[tokio::test]
async fn progress_is_monotonic_and_completes_once() {
    let (sink, mut events) = mpsc::unbounded_channel::<ProgressEvent>();
    let progress = ProgressReporter::new(sink);
    let outcome = ingest(
        RawSpecDocument::new(PETSTORE),
        &SpecflowConfig::default(),
        &progress,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    drop(progress);

    let mut percents = Vec::new();
    while let Some(event) = events.recv().await {
        percents.push(event.percent);
    }
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert_eq!(percents.iter().filter(|p| **p == 100).count(), 1);
    assert_eq!(percents.last(), Some(&100));
    assert_eq!(outcome.processed.stats.mode, ProcessingMode::Sequential);
}

#[tokio::test]
async fn cancelled_ingest_reports_nothing_after_failure() {
    let (sink, mut events) = mpsc::unbounded_channel::<ProgressEvent>();
    let progress = ProgressReporter::new(sink);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = ingest(
        RawSpecDocument::new(synthetic_openapi(600, 10)),
        &SpecflowConfig::default(),
        &progress,
        &cancel,
    )
    .await;
    assert!(matches!(
        result,
        Err(PipelineError::Process(ProcessError::Cancelled))
    ));

    drop(progress);
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn parse_failures_surface_as_pipeline_errors() {
    let result = ingest(
        RawSpecDocument::new("swagger: '2.0'\n"),
        &SpecflowConfig::default(),
        &ProgressReporter::silent(),
        &CancellationToken::new(),
    )
    .await;
    assert!(matches!(result, Err(PipelineError::Parse(_))));
}

#[tokio::test]
async fn configured_format_and_detection_apply() {
    let config = SpecflowConfig {
        format: Some(SpecFormat::GraphQl),
        ..SpecflowConfig::default()
    };
    let outcome = ingest(
        RawSpecDocument::new(GRAPHQL),
        &config,
        &ProgressReporter::silent(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(outcome.processed.spec.format, SpecFormat::GraphQl);
    assert_eq!(outcome.detection.pagination.len(), 1);
    assert!(outcome.detection.auth.is_empty());

    let petstore = ingest(
        RawSpecDocument::new(PETSTORE),
        &SpecflowConfig::default(),
        &ProgressReporter::silent(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(petstore.detection.auth[0].kind, AuthKind::OAuth2);
    // Missing operation ids are derived during processing
    let get_pet = &petstore.processed.spec.endpoints[2];
    assert_eq!(get_pet.operation_id.as_deref(), Some("getPet"));
}
