use indexmap::IndexMap;
use serde::Serialize;

use crate::model::{Endpoint, SchemaNode, UnifiedSpec};

/// Lookup tables over a processed spec. Endpoint entries are positions in
/// `UnifiedSpec::endpoints`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpecIndex {
    pub by_operation_id: IndexMap<String, usize>,
    pub by_tag: IndexMap<String, Vec<usize>>,
    /// Schema name → number of reference markers pointing at it.
    pub schema_references: IndexMap<String, usize>,
}

impl SpecIndex {
    pub fn build(spec: &UnifiedSpec) -> Self {
        let mut index = SpecIndex::default();
        for name in spec.schemas.keys() {
            index.schema_references.insert(name.clone(), 0);
        }

        for (position, endpoint) in spec.endpoints.iter().enumerate() {
            if let Some(id) = &endpoint.operation_id {
                index.by_operation_id.entry(id.clone()).or_insert(position);
            }
            for tag in &endpoint.tags {
                let positions = index.by_tag.entry(tag.clone()).or_default();
                if positions.last() != Some(&position) {
                    positions.push(position);
                }
            }
            for node in endpoint.schemas() {
                index.count_references(node);
            }
        }
        for node in spec.schemas.values() {
            index.count_references(node);
        }
        index
    }

    fn count_references(&mut self, node: &SchemaNode) {
        for name in node.references() {
            *self.schema_references.entry(name.to_string()).or_insert(0) += 1;
        }
    }

    pub fn endpoint<'a>(&self, spec: &'a UnifiedSpec, operation_id: &str) -> Option<&'a Endpoint> {
        self.by_operation_id
            .get(operation_id)
            .and_then(|&i| spec.endpoints.get(i))
    }

    pub fn tagged<'a>(&self, spec: &'a UnifiedSpec, tag: &str) -> Vec<&'a Endpoint> {
        self.by_tag
            .get(tag)
            .map(|positions| positions.iter().filter_map(|&i| spec.endpoints.get(i)).collect())
            .unwrap_or_default()
    }

    /// Named schemas nothing references.
    pub fn unreferenced_schemas(&self) -> Vec<&str> {
        self.schema_references
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Method, Response, SchemaBody, SchemaType, SpecFormat};

    #[test]
    fn test_build_index() {
        let mut spec = UnifiedSpec::new(SpecFormat::OpenApi, "t", "1");
        let mut node = SchemaBody::of_type(SchemaType::Object);
        node.properties
            .insert("next".into(), SchemaNode::reference("Node"));
        spec.schemas.insert("Node".into(), SchemaNode::resolved(node));
        spec.schemas
            .insert("Unused".into(), SchemaNode::of_type(SchemaType::String));

        let mut list = Endpoint::new("/nodes", Method::Get);
        list.operation_id = Some("listNodes".into());
        list.tags = vec!["nodes".into()];
        list.responses.push(Response {
            status: "200".into(),
            description: None,
            content_type: None,
            schema: Some(SchemaNode::reference("Node")),
        });
        let mut create = Endpoint::new("/nodes", Method::Post);
        create.operation_id = Some("createNode".into());
        create.tags = vec!["nodes".into(), "write".into()];
        spec.endpoints = vec![list, create];

        let index = SpecIndex::build(&spec);
        assert_eq!(
            index.endpoint(&spec, "createNode").map(|e| e.method),
            Some(Method::Post)
        );
        assert_eq!(index.tagged(&spec, "nodes").len(), 2);
        assert_eq!(index.schema_references["Node"], 2);
        assert_eq!(index.unreferenced_schemas(), vec!["Unused"]);
    }
}
