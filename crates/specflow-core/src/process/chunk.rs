use serde::Serialize;

use crate::model::{SpecItem, UnifiedSpec};

pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_MAX_BATCH_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Endpoints,
    Models,
}

impl ChunkKind {
    /// Lower runs first: endpoints before models.
    pub fn priority(&self) -> u8 {
        match self {
            ChunkKind::Endpoints => 1,
            ChunkKind::Models => 2,
        }
    }
}

/// A contiguous slice of endpoints or models processed as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingChunk {
    /// Creation index; results are reassembled in this order.
    pub id: usize,
    pub kind: ChunkKind,
    pub items: Vec<SpecItem>,
    pub size: usize,
    pub priority: u8,
}

impl ProcessingChunk {
    fn new(id: usize, kind: ChunkKind, items: Vec<SpecItem>) -> Self {
        Self {
            id,
            kind,
            size: items.len(),
            priority: kind.priority(),
            items,
        }
    }
}

/// Split a spec into chunks of at most `chunk_size` items. Endpoints and
/// models are partitioned independently, endpoints first, so every item
/// lands in exactly one chunk. A zero size is treated as one.
pub fn partition(spec: UnifiedSpec, chunk_size: usize) -> Vec<ProcessingChunk> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();

    let endpoints: Vec<SpecItem> = spec.endpoints.into_iter().map(SpecItem::Endpoint).collect();
    let models: Vec<SpecItem> = spec
        .schemas
        .into_iter()
        .map(|(name, schema)| SpecItem::Model { name, schema })
        .collect();

    for (kind, items) in [(ChunkKind::Endpoints, endpoints), (ChunkKind::Models, models)] {
        let mut items = items.into_iter().peekable();
        while items.peek().is_some() {
            let batch: Vec<SpecItem> = items.by_ref().take(chunk_size).collect();
            chunks.push(ProcessingChunk::new(chunks.len(), kind, batch));
        }
    }
    chunks
}

/// Order chunks by priority, then larger chunks first. The sort is stable,
/// so equal chunks keep creation order.
pub fn processing_order(chunks: &mut [ProcessingChunk]) {
    chunks.sort_by(|a, b| a.priority.cmp(&b.priority).then(b.size.cmp(&a.size)));
}

/// Number of chunks run concurrently: a quarter of the total, rounded up,
/// capped at `max_width` and never above [`DEFAULT_MAX_BATCH_WIDTH`], and at
/// least one.
pub fn batch_width(total_chunks: usize, max_width: usize) -> usize {
    total_chunks
        .div_ceil(4)
        .min(max_width.clamp(1, DEFAULT_MAX_BATCH_WIDTH))
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Endpoint, Method, SchemaNode, SchemaType, SpecFormat};

    fn spec(endpoints: usize, models: usize) -> UnifiedSpec {
        let mut spec = UnifiedSpec::new(SpecFormat::OpenApi, "t", "1");
        for i in 0..endpoints {
            spec.endpoints
                .push(Endpoint::new(format!("/r{i}"), Method::Get));
        }
        for i in 0..models {
            spec.schemas
                .insert(format!("M{i}"), SchemaNode::of_type(SchemaType::Object));
        }
        spec
    }

    #[test]
    fn test_partition_sizes_and_ids() {
        let chunks = partition(spec(250, 120), 100);
        let sizes: Vec<_> = chunks.iter().map(|c| (c.id, c.kind, c.size)).collect();
        assert_eq!(
            sizes,
            vec![
                (0, ChunkKind::Endpoints, 100),
                (1, ChunkKind::Endpoints, 100),
                (2, ChunkKind::Endpoints, 50),
                (3, ChunkKind::Models, 100),
                (4, ChunkKind::Models, 20),
            ]
        );
        assert!(chunks[..3].iter().all(|c| c.priority == 1));
        assert!(chunks[3..].iter().all(|c| c.priority == 2));
    }

    #[test]
    fn test_empty_spec_has_no_chunks() {
        assert!(partition(spec(0, 0), 100).is_empty());
    }

    #[test]
    fn test_processing_order() {
        let mut chunks = partition(spec(150, 250), 100);
        processing_order(&mut chunks);
        let order: Vec<_> = chunks.iter().map(|c| c.id).collect();
        // endpoints (100, 50), then models (100, 100, 50)
        assert_eq!(order, vec![0, 1, 2, 3, 4]);

        let mut chunks = partition(spec(50, 0), 20);
        chunks.reverse();
        processing_order(&mut chunks);
        let sizes: Vec<_> = chunks.iter().map(|c| c.size).collect();
        assert_eq!(sizes, vec![20, 20, 10]);
    }

    #[test]
    fn test_batch_width() {
        assert_eq!(batch_width(1, 4), 1);
        assert_eq!(batch_width(4, 4), 1);
        assert_eq!(batch_width(5, 4), 2);
        assert_eq!(batch_width(13, 4), 4);
        assert_eq!(batch_width(100, 4), 4);
        assert_eq!(batch_width(0, 4), 1);
        assert_eq!(batch_width(13, 2), 2);
    }

    #[test]
    fn test_batch_width_never_exceeds_four() {
        assert_eq!(batch_width(64, 16), 4);
        assert_eq!(batch_width(64, usize::MAX), 4);
        assert_eq!(batch_width(64, 0), 1);
    }
}
