use crate::model::{Endpoint, ParameterLocation, SchemaNode, SpecItem};

use super::name_normalizer::route_to_name;

/// Normalize one processing item.
pub fn normalize_item(item: SpecItem) -> SpecItem {
    match item {
        SpecItem::Endpoint(mut endpoint) => {
            normalize_endpoint(&mut endpoint);
            SpecItem::Endpoint(endpoint)
        }
        SpecItem::Model { name, mut schema } => {
            normalize_model(&mut schema);
            SpecItem::Model { name, schema }
        }
    }
}

/// Fill in a missing operation id and drop repeated tags and parameters.
/// The first parameter for a `(name, location)` pair wins; header names
/// compare case-insensitively.
pub fn normalize_endpoint(endpoint: &mut Endpoint) {
    let missing_id = endpoint
        .operation_id
        .as_deref()
        .is_none_or(|id| id.trim().is_empty());
    if missing_id {
        endpoint.operation_id = Some(route_to_name(endpoint.method, &endpoint.path));
    }

    let mut seen_tags: Vec<String> = Vec::with_capacity(endpoint.tags.len());
    endpoint.tags.retain(|tag| {
        if seen_tags.contains(tag) {
            false
        } else {
            seen_tags.push(tag.clone());
            true
        }
    });

    let mut seen_params: Vec<(String, ParameterLocation)> = Vec::new();
    endpoint.parameters.retain(|param| {
        let name = if param.location == ParameterLocation::Header {
            param.name.to_ascii_lowercase()
        } else {
            param.name.clone()
        };
        let key = (name, param.location);
        if seen_params.contains(&key) {
            false
        } else {
            seen_params.push(key);
            true
        }
    });
}

/// De-duplicate `required` and restrict it to declared properties, at
/// every object level of the schema.
pub fn normalize_model(schema: &mut SchemaNode) {
    let Some(body) = schema.body_mut() else {
        return;
    };
    // Composition fragments may require properties declared elsewhere
    let restrict = !body.properties.is_empty();
    let mut kept: Vec<String> = Vec::with_capacity(body.required.len());
    for name in std::mem::take(&mut body.required) {
        let declared = !restrict || body.properties.contains_key(&name);
        if declared && !kept.contains(&name) {
            kept.push(name);
        }
    }
    body.required = kept;
    for child in body.children_mut() {
        normalize_model(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Method, Parameter, SchemaBody, SchemaType};

    #[test]
    fn test_endpoint_gets_route_name() {
        let mut endpoint = Endpoint::new("/pets/{petId}", Method::Get);
        endpoint.tags = vec!["pets".into(), "store".into(), "pets".into()];
        endpoint.parameters = vec![
            Parameter::new("petId", ParameterLocation::Path),
            Parameter::new("X-Trace", ParameterLocation::Header),
            Parameter::new("x-trace", ParameterLocation::Header),
            Parameter::new("petId", ParameterLocation::Query),
        ];
        normalize_endpoint(&mut endpoint);
        assert_eq!(endpoint.operation_id.as_deref(), Some("getPet"));
        assert_eq!(endpoint.tags, vec!["pets", "store"]);
        let names: Vec<_> = endpoint
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.location))
            .collect();
        assert_eq!(
            names,
            vec![
                ("petId", ParameterLocation::Path),
                ("X-Trace", ParameterLocation::Header),
                ("petId", ParameterLocation::Query),
            ]
        );
    }

    #[test]
    fn test_existing_operation_id_is_kept() {
        let mut endpoint = Endpoint::new("/pets", Method::Post);
        endpoint.operation_id = Some("addPet".into());
        normalize_endpoint(&mut endpoint);
        assert_eq!(endpoint.operation_id.as_deref(), Some("addPet"));
    }

    #[test]
    fn test_model_required_is_restricted() {
        let mut inner = SchemaBody::of_type(SchemaType::Object);
        inner
            .properties
            .insert("b".into(), SchemaNode::of_type(SchemaType::String));
        inner.required = vec!["b".into(), "b".into(), "ghost".into()];
        let mut body = SchemaBody::of_type(SchemaType::Object);
        body.properties
            .insert("a".into(), SchemaNode::of_type(SchemaType::String));
        body.properties
            .insert("inner".into(), SchemaNode::resolved(inner));
        body.required = vec!["a".into(), "missing".into(), "a".into()];

        let mut schema = SchemaNode::resolved(body);
        normalize_model(&mut schema);
        let body = schema.body().unwrap();
        assert_eq!(body.required, vec!["a"]);
        assert_eq!(body.properties["inner"].body().unwrap().required, vec!["b"]);
    }
}
