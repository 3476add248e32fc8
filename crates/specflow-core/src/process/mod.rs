//! Scale-adaptive processing of a parsed spec.
//!
//! [`SpecProcessor::process`] normalizes every endpoint and model. How the
//! work is scheduled follows the [`OptimizationStrategy`]: one pass, chunks
//! in sequence, batches of chunks on concurrent tasks, or a lazy stream.
//! The resulting item set does not depend on the schedule.

pub mod cache;
pub mod chunk;
pub mod index;
pub mod progress;
pub mod stream;

use futures::future::join_all;
use futures::stream::StreamExt;
use log::{debug, info};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::analyze::OptimizationStrategy;
use crate::error::ProcessError;
use crate::model::{SpecItem, UnifiedSpec};
use crate::transform::{DedupReport, deduplicate, normalize_endpoint, normalize_model};

pub use cache::NormalizationCache;
pub use chunk::{ChunkKind, ProcessingChunk, batch_width, partition, processing_order};
pub use index::SpecIndex;
pub use progress::{ProgressEvent, ProgressReporter, ProgressStage};
pub use stream::{item_stream, normalized_stream};

/// Scheduling knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    pub chunk_size: usize,
    pub max_batch_width: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            chunk_size: chunk::DEFAULT_CHUNK_SIZE,
            max_batch_width: chunk::DEFAULT_MAX_BATCH_WIDTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    Sequential,
    Chunked,
    Parallel,
    Streaming,
}

impl ProcessingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::Sequential => "sequential",
            ProcessingMode::Chunked => "chunked",
            ProcessingMode::Parallel => "parallel",
            ProcessingMode::Streaming => "streaming",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingStats {
    pub mode: ProcessingMode,
    pub items: usize,
    pub chunks: usize,
    pub batches: usize,
    pub cache_hits: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup: Option<DedupReport>,
}

/// A processed spec with the artifacts its strategy asked for.
#[derive(Debug, Clone)]
pub struct ProcessedSpec {
    pub spec: UnifiedSpec,
    pub index: Option<SpecIndex>,
    pub stats: ProcessingStats,
}

/// Normalize one item, memoizing models through `cache` when given.
pub fn process_item(item: SpecItem, cache: Option<&NormalizationCache>) -> SpecItem {
    match item {
        SpecItem::Endpoint(mut endpoint) => {
            normalize_endpoint(&mut endpoint);
            SpecItem::Endpoint(endpoint)
        }
        SpecItem::Model { name, mut schema } => {
            let schema = match cache {
                Some(cache) => cache.normalize(schema),
                None => {
                    normalize_model(&mut schema);
                    schema
                }
            };
            SpecItem::Model { name, schema }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpecProcessor {
    config: ProcessorConfig,
}

impl SpecProcessor {
    pub fn new(config: ProcessorConfig) -> Self {
        Self { config }
    }

    /// Process a spec under a strategy.
    ///
    /// Progress reaches 100 exactly once on success and goes quiet on
    /// failure. Cancellation is observed between chunks, batches and
    /// streamed items; a cancelled call returns [`ProcessError::Cancelled`]
    /// and discards finished chunks.
    pub async fn process(
        &self,
        spec: UnifiedSpec,
        strategy: &OptimizationStrategy,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<ProcessedSpec, ProcessError> {
        match self.run(spec, strategy, progress, cancel).await {
            Ok(processed) => {
                progress.complete();
                info!(
                    "processed {} items ({}, {} chunks)",
                    processed.stats.items,
                    processed.stats.mode.as_str(),
                    processed.stats.chunks
                );
                Ok(processed)
            }
            Err(err) => {
                progress.fail();
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        mut spec: UnifiedSpec,
        strategy: &OptimizationStrategy,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<ProcessedSpec, ProcessError> {
        check(cancel)?;
        if strategy.use_indexing {
            progress.report(ProgressStage::Indexing, 10);
        }

        let dedup = if strategy.use_compression {
            let report = deduplicate(&mut spec);
            debug!("compression merged {} schemas", report.removed());
            progress.report(ProgressStage::Compression, 20);
            Some(report)
        } else {
            None
        };
        check(cancel)?;

        // Keep the document header; items flow through the scheduler
        let mut shell = spec.clone_header();
        let total = spec.endpoints.len() + spec.schemas.len();
        let cache = strategy.use_caching.then(NormalizationCache::new);
        progress.processing(0, total);

        let (mode, chunks, batches, items) = if strategy.use_streaming {
            let items = self.run_streaming(spec, cache.clone(), total, progress, cancel).await?;
            (ProcessingMode::Streaming, 0, 0, items)
        } else if strategy.use_chunking {
            let mut chunks = partition(spec, self.config.chunk_size);
            let count = chunks.len();
            processing_order(&mut chunks);
            if strategy.use_parallelization {
                let (batches, items) = self
                    .run_parallel(chunks, cache.clone(), total, progress, cancel)
                    .await?;
                (ProcessingMode::Parallel, count, batches, items)
            } else {
                let items = run_chunks(chunks, cache.as_ref(), total, progress, cancel)?;
                (ProcessingMode::Chunked, count, 0, items)
            }
        } else {
            let items = item_sequence(spec)
                .map(|item| process_item(item, cache.as_ref()))
                .collect::<Vec<_>>();
            progress.processing(total, total);
            (ProcessingMode::Sequential, 0, 0, items)
        };
        check(cancel)?;

        let item_count = items.len();
        for item in items {
            match item {
                SpecItem::Endpoint(endpoint) => shell.endpoints.push(endpoint),
                SpecItem::Model { name, schema } => {
                    shell.schemas.insert(name, schema);
                }
            }
        }
        let index = strategy.use_indexing.then(|| SpecIndex::build(&shell));
        progress.report(ProgressStage::Finalize, 95);

        Ok(ProcessedSpec {
            spec: shell,
            index,
            stats: ProcessingStats {
                mode,
                items: item_count,
                chunks,
                batches,
                cache_hits: cache.as_ref().map_or(0, NormalizationCache::hits),
                dedup,
            },
        })
    }

    /// Pull items one at a time through [`normalized_stream`], checking
    /// cancellation per item. Normalized items are gathered into a `Vec`
    /// because the result is a rebuilt [`UnifiedSpec`], so only the input
    /// side is lazy; callers that want per-item output should consume
    /// [`normalized_stream`] directly.
    async fn run_streaming(
        &self,
        spec: UnifiedSpec,
        cache: Option<NormalizationCache>,
        total: usize,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Vec<SpecItem>, ProcessError> {
        let mut out = Vec::with_capacity(total);
        let stream = normalized_stream(spec, cache, cancel.clone());
        futures::pin_mut!(stream);
        while let Some(item) = stream.next().await {
            out.push(item?);
            progress.processing(out.len(), total);
        }
        Ok(out)
    }

    /// Run chunks in batches on separate tasks. Each batch finishes before
    /// the next starts; results are put back in chunk creation order.
    async fn run_parallel(
        &self,
        chunks: Vec<ProcessingChunk>,
        cache: Option<NormalizationCache>,
        total: usize,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<(usize, Vec<SpecItem>), ProcessError> {
        let width = batch_width(chunks.len(), self.config.max_batch_width);
        let mut results: Vec<(usize, Vec<SpecItem>)> = Vec::with_capacity(chunks.len());
        let mut done = 0;
        let mut batches = 0;
        let mut pending = chunks.into_iter().peekable();

        while pending.peek().is_some() {
            check(cancel)?;
            let batch: Vec<ProcessingChunk> = pending.by_ref().take(width).collect();
            let handles = batch.into_iter().map(|chunk| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    let items: Vec<SpecItem> = chunk
                        .items
                        .into_iter()
                        .map(|item| process_item(item, cache.as_ref()))
                        .collect();
                    (chunk.id, items)
                })
            });
            for joined in join_all(handles).await {
                let (id, items) = joined.map_err(|e| ProcessError::Task(e.to_string()))?;
                done += items.len();
                results.push((id, items));
            }
            batches += 1;
            debug!("batch {batches} done, {done}/{total} items");
            progress.processing(done, total);
        }
        check(cancel)?;
        Ok((batches, reassemble(results)))
    }
}

fn run_chunks(
    chunks: Vec<ProcessingChunk>,
    cache: Option<&NormalizationCache>,
    total: usize,
    progress: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<Vec<SpecItem>, ProcessError> {
    let mut results = Vec::with_capacity(chunks.len());
    let mut done = 0;
    for chunk in chunks {
        check(cancel)?;
        let items: Vec<SpecItem> = chunk
            .items
            .into_iter()
            .map(|item| process_item(item, cache))
            .collect();
        done += items.len();
        progress.processing(done, total);
        results.push((chunk.id, items));
    }
    Ok(reassemble(results))
}

fn reassemble(mut results: Vec<(usize, Vec<SpecItem>)>) -> Vec<SpecItem> {
    results.sort_by_key(|(id, _)| *id);
    results.into_iter().flat_map(|(_, items)| items).collect()
}

fn item_sequence(spec: UnifiedSpec) -> impl Iterator<Item = SpecItem> {
    let endpoints = spec.endpoints.into_iter().map(SpecItem::Endpoint);
    let models = spec
        .schemas
        .into_iter()
        .map(|(name, schema)| SpecItem::Model { name, schema });
    endpoints.chain(models)
}

fn check(cancel: &CancellationToken) -> Result<(), ProcessError> {
    if cancel.is_cancelled() {
        Err(ProcessError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Endpoint, Method, SchemaBody, SchemaNode, SchemaType, SpecFormat};
    use tokio::sync::mpsc;

    fn spec(endpoints: usize, models: usize) -> UnifiedSpec {
        let mut spec = UnifiedSpec::new(SpecFormat::OpenApi, "Bulk", "1.0");
        for i in 0..endpoints {
            let mut endpoint = Endpoint::new(format!("/things{i}/{{id}}"), Method::Get);
            endpoint.tags = vec!["things".into(), "things".into()];
            spec.endpoints.push(endpoint);
        }
        for i in 0..models {
            let mut body = SchemaBody::of_type(SchemaType::Object);
            body.properties
                .insert(format!("f{i}"), SchemaNode::of_type(SchemaType::String));
            body.required = vec![format!("f{i}"), "ghost".into()];
            spec.schemas.insert(format!("M{i}"), SchemaNode::resolved(body));
        }
        spec
    }

    fn object(names: &[&str]) -> SchemaNode {
        let mut body = SchemaBody::of_type(SchemaType::Object);
        for name in names {
            body.properties
                .insert(name.to_string(), SchemaNode::of_type(SchemaType::String));
        }
        SchemaNode::resolved(body)
    }

    fn keys(spec: &UnifiedSpec) -> Vec<String> {
        item_sequence(spec.clone()).map(|i| i.key()).collect()
    }

    async fn run(spec: UnifiedSpec, strategy: OptimizationStrategy) -> ProcessedSpec {
        SpecProcessor::default()
            .process(
                spec,
                &strategy,
                &ProgressReporter::silent(),
                &CancellationToken::new(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_every_schedule_yields_same_items() {
        let mut input = spec(730, 40);
        // Same shape in two declaration orders; caching must not merge them
        input.schemas.insert("Ab".into(), object(&["a", "b"]));
        input.schemas.insert("Ba".into(), object(&["b", "a"]));
        let sequential = run(input.clone(), OptimizationStrategy::default()).await;
        let chunked = run(
            input.clone(),
            OptimizationStrategy {
                use_chunking: true,
                ..Default::default()
            },
        )
        .await;
        let parallel = run(
            input.clone(),
            OptimizationStrategy {
                use_chunking: true,
                use_parallelization: true,
                use_caching: true,
                ..Default::default()
            },
        )
        .await;
        let streaming = run(
            input.clone(),
            OptimizationStrategy {
                use_streaming: true,
                ..Default::default()
            },
        )
        .await;

        // Serialized, so property order is compared too
        let json = |spec: &UnifiedSpec| serde_json::to_string(spec).unwrap();
        assert_eq!(keys(&sequential.spec), keys(&input));
        assert_eq!(json(&sequential.spec), json(&chunked.spec));
        assert_eq!(json(&sequential.spec), json(&parallel.spec));
        assert_eq!(json(&sequential.spec), json(&streaming.spec));
        let order: Vec<&String> = parallel.spec.schemas["Ba"]
            .body()
            .unwrap()
            .properties
            .keys()
            .collect();
        assert_eq!(order, vec!["b", "a"]);
        assert_eq!(parallel.stats.mode, ProcessingMode::Parallel);
        assert_eq!(parallel.stats.chunks, 9);
        // 9 chunks at width 3
        assert_eq!(parallel.stats.batches, 3);
    }

    #[tokio::test]
    async fn test_items_are_normalized() {
        let processed = run(spec(2, 1), OptimizationStrategy::default()).await;
        let endpoint = &processed.spec.endpoints[0];
        assert_eq!(endpoint.operation_id.as_deref(), Some("getThings0"));
        assert_eq!(endpoint.tags, vec!["things"]);
        let model = processed.spec.schemas["M0"].body().unwrap();
        assert_eq!(model.required, vec!["f0"]);
    }

    #[tokio::test]
    async fn test_indexing_builds_index() {
        let processed = run(
            spec(3, 0),
            OptimizationStrategy {
                use_indexing: true,
                ..Default::default()
            },
        )
        .await;
        let index = processed.index.unwrap();
        assert_eq!(index.by_tag["things"], vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_progress_reaches_hundred_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let progress = ProgressReporter::new(tx);
        let strategy = OptimizationStrategy {
            use_chunking: true,
            use_parallelization: true,
            use_indexing: true,
            use_compression: true,
            ..Default::default()
        };
        SpecProcessor::default()
            .process(spec(600, 10), &strategy, &progress, &CancellationToken::new())
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event.percent);
        }
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.iter().filter(|p| **p == 100).count(), 1);
        assert_eq!(seen.first(), Some(&10));
        assert_eq!(seen.last(), Some(&100));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let progress = ProgressReporter::new(tx);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = SpecProcessor::default()
            .process(spec(10, 1), &OptimizationStrategy::default(), &progress, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Cancelled));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cancelled_between_batches() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let progress = ProgressReporter::new(tx);
        let cancel = CancellationToken::new();
        // Cancel as soon as the first batch reports progress
        let listener = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let mut seen = Vec::new();
                while let Some(event) = rx.recv().await {
                    if event.percent > 30 {
                        cancel.cancel();
                    }
                    seen.push(event.percent);
                }
                seen
            }
        });
        let strategy = OptimizationStrategy {
            use_chunking: true,
            use_parallelization: true,
            ..Default::default()
        };
        let processor = SpecProcessor::new(ProcessorConfig {
            chunk_size: 50,
            max_batch_width: 2,
        });

        let err = processor
            .process(spec(600, 10), &strategy, &progress, &cancel)
            .await
            .unwrap_err();
        drop(progress);
        let seen = listener.await.unwrap();

        assert!(matches!(err, ProcessError::Cancelled));
        assert!(seen.iter().any(|p| *p > 30), "a batch finished first");
        assert!(!seen.contains(&100));
    }
}
