use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::model::SchemaNode;

/// Expands `Reference` markers against a set of named schemas.
///
/// Resolution is deterministic. A reference to a name already being
/// expanded on the current path stays a `Reference`, so cyclic schemas
/// produce finite trees. References to unknown names are left as they are.
pub struct SchemaResolver<'a> {
    schemas: &'a IndexMap<String, SchemaNode>,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(schemas: &'a IndexMap<String, SchemaNode>) -> Self {
        Self { schemas }
    }

    /// Resolve a node, replacing top-level and nested references.
    ///
    /// The result is a full tree, so a schema reached along many paths is
    /// copied once per path. Prefer [`resolve_depth`](Self::resolve_depth)
    /// when only the first few levels are inspected.
    pub fn resolve(&self, node: &SchemaNode) -> SchemaNode {
        let mut stack = Vec::new();
        self.expand(node, &mut stack, None)
    }

    /// Resolve only the first `depth` levels below `node`. References
    /// deeper than that are left as markers.
    pub fn resolve_depth(&self, node: &SchemaNode, depth: usize) -> SchemaNode {
        let mut stack = Vec::new();
        self.expand(node, &mut stack, Some(depth))
    }

    /// Resolve a named schema. Its own name counts as in progress, so a
    /// self reference stays a marker at the first level.
    pub fn resolve_named(&self, name: &str) -> Option<SchemaNode> {
        let node = self.schemas.get(name)?;
        let mut stack = vec![name.to_string()];
        Some(self.expand(node, &mut stack, None))
    }

    fn expand(
        &self,
        node: &SchemaNode,
        stack: &mut Vec<String>,
        depth: Option<usize>,
    ) -> SchemaNode {
        match node {
            SchemaNode::Reference(name) => {
                if stack.iter().any(|s| s == name) {
                    return node.clone();
                }
                let Some(target) = self.schemas.get(name) else {
                    return node.clone();
                };
                stack.push(name.clone());
                let expanded = self.expand(target, stack, depth);
                stack.pop();
                expanded
            }
            SchemaNode::Resolved(_) if depth == Some(0) => node.clone(),
            SchemaNode::Resolved(body) => {
                let mut body = body.as_ref().clone();
                let below = depth.map(|d| d - 1);
                for child in body.children_mut() {
                    *child = self.expand(child, stack, below);
                }
                SchemaNode::resolved(body)
            }
        }
    }
}

/// Serialize a schema with every object's keys sorted. Two schemas are
/// structurally identical exactly when their canonical forms are equal.
pub fn canonical_json(node: &SchemaNode) -> String {
    let value = serde_json::to_value(node).unwrap_or(Value::Null);
    sort_keys(value).to_string()
}

pub(crate) fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k, sort_keys(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
