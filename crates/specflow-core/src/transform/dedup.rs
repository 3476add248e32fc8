use std::collections::HashMap;

use indexmap::IndexMap;
use log::debug;
use serde::Serialize;

use super::schema_resolver::canonical_json;
use crate::model::{SchemaNode, UnifiedSpec};

/// Outcome of a deduplication run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DedupReport {
    /// Dropped schema name → the kept name it now points at.
    pub merged: IndexMap<String, String>,
    /// References rewritten across schemas and endpoints.
    pub references_rewritten: usize,
    /// Passes run until nothing changed.
    pub passes: usize,
}

impl DedupReport {
    pub fn removed(&self) -> usize {
        self.merged.len()
    }
}

/// Merge structurally identical named schemas.
///
/// Schemas are compared as declared, with nested references compared by
/// name. The first declaration of each shape is kept; later ones are
/// removed and every reference to them is repointed at the kept name.
/// Repointing can make further schemas identical, so passes repeat until
/// one finds nothing to merge. Running this twice removes nothing the
/// second time.
pub fn deduplicate(spec: &mut UnifiedSpec) -> DedupReport {
    let mut report = DedupReport::default();
    loop {
        report.passes += 1;
        let renames = find_duplicates(&spec.schemas);
        if renames.is_empty() {
            break;
        }

        spec.schemas.retain(|name, _| !renames.contains_key(name));
        let rename = |name: &str| renames.get(name).cloned();
        for node in spec.schemas.values_mut() {
            report.references_rewritten += node.rename_references(&rename);
        }
        for endpoint in &mut spec.endpoints {
            for node in endpoint.schemas_mut() {
                report.references_rewritten += node.rename_references(&rename);
            }
        }
        debug!("dedup pass {} merged {} schemas", report.passes, renames.len());
        report.merged.extend(renames);
    }
    report
}

/// Map each later duplicate to the first schema with the same canonical
/// form.
fn find_duplicates(schemas: &IndexMap<String, SchemaNode>) -> IndexMap<String, String> {
    let mut first_by_shape: HashMap<String, &str> = HashMap::new();
    let mut renames = IndexMap::new();
    for (name, node) in schemas {
        let shape = canonical_json(node);
        match first_by_shape.get(&shape) {
            Some(kept) => {
                renames.insert(name.clone(), kept.to_string());
            }
            None => {
                first_by_shape.insert(shape, name);
            }
        }
    }
    renames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Endpoint, Method, Response, SchemaBody, SchemaType, SpecFormat};

    fn address() -> SchemaNode {
        let mut body = SchemaBody::of_type(SchemaType::Object);
        body.properties
            .insert("street".to_string(), SchemaNode::of_type(SchemaType::String));
        body.required.push("street".to_string());
        SchemaNode::resolved(body)
    }

    fn holder(target: &str) -> SchemaNode {
        let mut body = SchemaBody::of_type(SchemaType::Object);
        body.properties
            .insert("address".to_string(), SchemaNode::reference(target));
        SchemaNode::resolved(body)
    }

    fn spec() -> UnifiedSpec {
        let mut spec = UnifiedSpec::new(SpecFormat::OpenApi, "t", "1");
        spec.schemas.insert("Address".to_string(), address());
        spec.schemas.insert("ShippingAddress".to_string(), address());
        spec.schemas.insert("Home".to_string(), holder("Address"));
        spec.schemas.insert("Office".to_string(), holder("ShippingAddress"));
        let mut endpoint = Endpoint::new("/ship", Method::Get);
        endpoint.responses.push(Response {
            status: "200".to_string(),
            description: None,
            content_type: Some("application/json".to_string()),
            schema: Some(SchemaNode::reference("ShippingAddress")),
        });
        spec.endpoints.push(endpoint);
        spec
    }

    #[test]
    fn test_keeps_first_and_repoints() {
        let mut spec = spec();
        let report = deduplicate(&mut spec);
        assert_eq!(
            spec.schemas.keys().collect::<Vec<_>>(),
            vec!["Address", "Home"]
        );
        assert_eq!(report.merged["ShippingAddress"], "Address");
        assert_eq!(report.merged["Office"], "Home");
        let schema = spec.endpoints[0].responses[0].schema.as_ref().unwrap();
        assert_eq!(schema.reference_name(), Some("Address"));
    }

    #[test]
    fn test_idempotent() {
        let mut spec = spec();
        deduplicate(&mut spec);
        let count = spec.schemas.len();
        let second = deduplicate(&mut spec);
        assert_eq!(spec.schemas.len(), count);
        assert_eq!(second.removed(), 0);
        assert_eq!(second.passes, 1);
    }
}
