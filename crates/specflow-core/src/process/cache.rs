use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::model::SchemaNode;
use crate::transform::normalize_model;

/// Memoizes model normalization by the schema's serialized form, with
/// property order kept, so a hit returns exactly what normalizing the
/// caller's schema would. Clones share one table, so chunk tasks running
/// concurrently reuse each other's work.
#[derive(Debug, Clone, Default)]
pub struct NormalizationCache {
    inner: Arc<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: Mutex<HashMap<String, SchemaNode>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl NormalizationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&self, mut schema: SchemaNode) -> SchemaNode {
        let Ok(key) = serde_json::to_string(&schema) else {
            normalize_model(&mut schema);
            return schema;
        };
        if let Some(cached) = self.lookup(&key) {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            return cached;
        }
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        normalize_model(&mut schema);
        if let Ok(mut entries) = self.inner.entries.lock() {
            entries.entry(key).or_insert_with(|| schema.clone());
        }
        schema
    }

    fn lookup(&self, key: &str) -> Option<SchemaNode> {
        // Poisoned: treat as a miss
        let entries = self.inner.entries.lock().ok()?;
        entries.get(key).cloned()
    }

    pub fn hits(&self) -> usize {
        self.inner.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.inner.misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SchemaBody, SchemaType};

    fn model() -> SchemaNode {
        let mut body = SchemaBody::of_type(SchemaType::Object);
        body.properties
            .insert("id".into(), SchemaNode::of_type(SchemaType::String));
        body.required = vec!["id".into(), "id".into()];
        SchemaNode::resolved(body)
    }

    #[test]
    fn test_repeated_shape_hits() {
        let cache = NormalizationCache::new();
        let first = cache.normalize(model());
        let second = cache.clone().normalize(model());
        assert_eq!(first, second);
        assert_eq!(first.body().unwrap().required, vec!["id"]);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_reordered_properties_keep_their_order() {
        let object = |names: &[&str]| {
            let mut body = SchemaBody::of_type(SchemaType::Object);
            for name in names {
                body.properties
                    .insert(name.to_string(), SchemaNode::of_type(SchemaType::String));
            }
            SchemaNode::resolved(body)
        };
        let cache = NormalizationCache::new();
        cache.normalize(object(&["a", "b"]));
        let second = cache.normalize(object(&["b", "a"]));
        let order: Vec<&str> = second
            .body()
            .unwrap()
            .properties
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(order, vec!["b", "a"]);
        assert_eq!(cache.hits(), 0);
        assert_eq!(cache.misses(), 2);
    }
}
