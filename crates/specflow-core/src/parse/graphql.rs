//! GraphQL schema documents, supplied as a JSON-encoded SDL syntax tree.
//!
//! The tree is the `Document` produced by common GraphQL tooling, either
//! bare or wrapped in an envelope that names the API:
//!
//! ```json
//! { "title": "Shop", "version": "2.0.0", "document": { "kind": "Document", "definitions": [] } }
//! ```
//!
//! Object, input, interface, union and enum types become named schemas.
//! Every field of a root operation type becomes one endpoint at
//! `/graphql/<field>` whose arguments are query parameters.

use log::{debug, warn};
use serde_json::{Map, Value, json};

use super::FormatParser;
use super::common::{RequiredFields, scalar_string, str_field};
use super::refs::ReferenceTable;
use crate::error::ParseError;
use crate::model::{
    Endpoint, Method, Parameter, ParameterLocation, Response, SpecFormat, UnifiedSpec,
};

const DEFAULT_TITLE: &str = "GraphQL API";
const DEFAULT_VERSION: &str = "1.0.0";

pub struct GraphQlParser;

impl FormatParser for GraphQlParser {
    fn format(&self) -> SpecFormat {
        SpecFormat::GraphQl
    }

    fn parse_value(&self, document: &Value) -> Result<UnifiedSpec, ParseError> {
        let (envelope, tree) = match document.get("document") {
            Some(inner) => (Some(document), inner),
            None => (None, document),
        };
        let mut required = RequiredFields::new(SpecFormat::GraphQl);
        let definitions = required.array(Some(tree), "definitions", "definitions");
        required.finish()?;
        let Some(definitions) = definitions else {
            return Err(ParseError::Format("incomplete GraphQL document".to_string()));
        };

        let title = envelope
            .and_then(|e| str_field(e, "title"))
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let version = envelope
            .and_then(|e| e.get("version"))
            .and_then(scalar_string)
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());
        let mut spec = UnifiedSpec::new(SpecFormat::GraphQl, title, version);
        spec.description = envelope.and_then(|e| str_field(e, "description"));

        let roots = root_types(definitions);
        let types = collect_types(definitions);

        let mut schemas = Map::new();
        for (name, def) in &types {
            if roots.iter().any(|(_, root)| root == name) {
                continue;
            }
            if let Some(schema) = type_schema(def) {
                schemas.insert(name.clone(), schema);
            }
        }

        let mut table = ReferenceTable::with_definitions(Some(&schemas));
        for (method, root) in &roots {
            let Some(def) = types.iter().find(|(n, _)| n == root).map(|(_, d)| d) else {
                continue;
            };
            for &field in &def.fields {
                let Some(endpoint) = field_endpoint(&mut table, *method, root, field) else {
                    continue;
                };
                spec.endpoints.push(endpoint);
            }
        }
        spec.schemas = table.into_schemas();

        debug!(
            "parsed GraphQL '{}': {} root fields, {} types",
            spec.title,
            spec.endpoints.len(),
            spec.schemas.len()
        );
        Ok(spec)
    }
}

/// A type definition with its extensions folded in.
struct TypeDef<'doc> {
    kind: &'doc str,
    description: Option<String>,
    fields: Vec<&'doc Value>,
    members: Vec<&'doc Value>,
}

/// `name` is `{ "kind": "Name", "value": "..." }` in the tree; a bare
/// string is accepted too.
fn name_of(node: &Value) -> Option<String> {
    match node.get("name")? {
        Value::String(s) => Some(s.clone()),
        other => str_field(other, "value"),
    }
}

fn description_of(node: &Value) -> Option<String> {
    match node.get("description")? {
        Value::String(s) => Some(s.clone()),
        other => str_field(other, "value"),
    }
}

fn list<'doc>(node: &'doc Value, key: &str) -> Vec<&'doc Value> {
    node.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().collect())
        .unwrap_or_default()
}

/// Root operation types: from a `schema { ... }` definition when present,
/// otherwise the conventional `Query`, `Mutation` and `Subscription`.
fn root_types(definitions: &[Value]) -> Vec<(Method, String)> {
    let schema_def = definitions.iter().find(|d| {
        matches!(
            d.get("kind").and_then(Value::as_str),
            Some("SchemaDefinition") | Some("SchemaExtension")
        )
    });
    if let Some(schema_def) = schema_def {
        let roots: Vec<(Method, String)> = list(schema_def, "operationTypes")
            .into_iter()
            .filter_map(|op| {
                let method = match op.get("operation").and_then(Value::as_str)? {
                    "query" => Method::Query,
                    "mutation" => Method::Mutation,
                    "subscription" => Method::Subscription,
                    _ => return None,
                };
                Some((method, name_of(op.get("type")?)?))
            })
            .collect();
        if !roots.is_empty() {
            return roots;
        }
    }
    vec![
        (Method::Query, "Query".to_string()),
        (Method::Mutation, "Mutation".to_string()),
        (Method::Subscription, "Subscription".to_string()),
    ]
}

fn collect_types(definitions: &[Value]) -> Vec<(String, TypeDef<'_>)> {
    let mut types: Vec<(String, TypeDef<'_>)> = Vec::new();
    for def in definitions {
        let Some(kind) = def.get("kind").and_then(Value::as_str) else {
            continue;
        };
        let (base, extension) = match kind.strip_suffix("Extension") {
            Some(base) => (base, true),
            None => match kind.strip_suffix("Definition") {
                Some(base) => (base, false),
                None => continue,
            },
        };
        let base_kind = match base {
            "ObjectType" => "object",
            "InterfaceType" => "interface",
            "InputObjectType" => "input",
            "EnumType" => "enum",
            "UnionType" => "union",
            "ScalarType" => "scalar",
            _ => continue,
        };
        let Some(name) = name_of(def) else {
            warn!("skipping unnamed GraphQL {kind}");
            continue;
        };
        let members_key = match base_kind {
            "enum" => "values",
            "union" => "types",
            _ => "",
        };

        match types.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => {
                existing.fields.extend(list(def, "fields"));
                existing.members.extend(list(def, members_key));
            }
            None => {
                if extension {
                    debug!("extension of '{name}' precedes its definition");
                }
                types.push((
                    name,
                    TypeDef {
                        kind: base_kind,
                        description: description_of(def),
                        fields: list(def, "fields"),
                        members: list(def, members_key),
                    },
                ));
            }
        }
    }
    types
}

/// Synthesize a JSON schema for a named type. Scalars have none; they map
/// inline at each use.
fn type_schema(def: &TypeDef<'_>) -> Option<Value> {
    let mut schema = match def.kind {
        "object" | "interface" | "input" => {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for field in &def.fields {
                let (Some(name), Some(ty)) = (name_of(field), field.get("type")) else {
                    continue;
                };
                let (mut field_schema, non_null) = type_ref_schema(ty);
                if let (Some(desc), Some(obj)) = (description_of(field), field_schema.as_object_mut())
                {
                    if !obj.contains_key("$ref") {
                        obj.insert("description".to_string(), Value::String(desc));
                    }
                }
                if is_deprecated(field) {
                    if let Some(obj) = field_schema.as_object_mut() {
                        obj.entry("deprecated").or_insert(Value::Bool(true));
                    }
                }
                if non_null {
                    required.push(Value::String(name.clone()));
                }
                properties.insert(name, field_schema);
            }
            json!({ "type": "object", "properties": properties, "required": required })
        }
        "enum" => {
            let values: Vec<Value> = def
                .members
                .iter()
                .filter_map(|v| name_of(v).map(Value::String))
                .collect();
            json!({ "type": "string", "enum": values })
        }
        "union" => {
            let variants: Vec<Value> = def
                .members
                .iter()
                .filter_map(|m| name_of(m).map(|n| json!({ "$ref": format!("#/{n}") })))
                .collect();
            json!({ "oneOf": variants })
        }
        _ => return None,
    };
    if let (Some(desc), Some(obj)) = (def.description.clone(), schema.as_object_mut()) {
        obj.insert("description".to_string(), Value::String(desc));
    }
    Some(schema)
}

/// Map a type reference to a schema, reporting whether it is non-null.
fn type_ref_schema(ty: &Value) -> (Value, bool) {
    match ty.get("kind").and_then(Value::as_str) {
        Some("NonNullType") => {
            let inner = ty.get("type").map(|t| type_ref_schema(t).0);
            (inner.unwrap_or_else(|| json!({})), true)
        }
        Some("ListType") => {
            let items = ty.get("type").map(|t| type_ref_schema(t).0);
            (
                json!({ "type": "array", "items": items.unwrap_or_else(|| json!({})) }),
                false,
            )
        }
        _ => {
            let name = name_of(ty).unwrap_or_default();
            (named_type_schema(&name), false)
        }
    }
}

fn named_type_schema(name: &str) -> Value {
    match name {
        "Int" => json!({ "type": "integer", "format": "int32" }),
        "Float" => json!({ "type": "number", "format": "double" }),
        "Boolean" => json!({ "type": "boolean" }),
        "String" => json!({ "type": "string" }),
        "ID" => json!({ "type": "string", "format": "id" }),
        other => json!({ "$ref": format!("#/{other}") }),
    }
}

fn is_deprecated(node: &Value) -> bool {
    list(node, "directives")
        .into_iter()
        .any(|d| name_of(d).as_deref() == Some("deprecated"))
}

fn field_endpoint(
    table: &mut ReferenceTable<'_>,
    method: Method,
    root: &str,
    field: &Value,
) -> Option<Endpoint> {
    let name = name_of(field)?;
    let mut endpoint = Endpoint::new(format!("/graphql/{name}"), method);
    endpoint.operation_id = Some(name);
    endpoint.description = description_of(field);
    endpoint.deprecated = is_deprecated(field);
    endpoint.tags = vec![root.to_string()];

    for arg in list(field, "arguments") {
        let (Some(arg_name), Some(ty)) = (name_of(arg), arg.get("type")) else {
            continue;
        };
        let (schema, non_null) = type_ref_schema(ty);
        let mut param = Parameter::new(arg_name, ParameterLocation::Query);
        param.required = non_null && arg.get("defaultValue").is_none_or(Value::is_null);
        param.deprecated = is_deprecated(arg);
        param.description = description_of(arg);
        param.schema = Some(table.build(&schema));
        endpoint.parameters.push(param);
    }

    let schema = field.get("type").map(|ty| table.build(&type_ref_schema(ty).0));
    endpoint.responses.push(Response {
        status: "200".to_string(),
        description: Some("Successful response".to_string()),
        content_type: Some("application/json".to_string()),
        schema,
    });
    Some(endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SchemaNode, SchemaType};

    fn named(kind: &str, name: &str) -> Value {
        json!({ "kind": kind, "name": { "kind": "Name", "value": name } })
    }

    fn non_null(inner: Value) -> Value {
        json!({ "kind": "NonNullType", "type": inner })
    }

    fn field(name: &str, ty: Value, args: Vec<Value>) -> Value {
        json!({
            "kind": "FieldDefinition",
            "name": { "kind": "Name", "value": name },
            "arguments": args,
            "type": ty
        })
    }

    fn sample() -> Value {
        let mut query = named("ObjectTypeDefinition", "Query");
        query["fields"] = json!([field(
            "user",
            named("NamedType", "User"),
            vec![json!({
                "kind": "InputValueDefinition",
                "name": { "kind": "Name", "value": "id" },
                "type": non_null(named("NamedType", "ID"))
            })]
        )]);
        let mut user = named("ObjectTypeDefinition", "User");
        user["fields"] = json!([
            field("id", non_null(named("NamedType", "ID")), vec![]),
            field(
                "friends",
                json!({ "kind": "ListType", "type": named("NamedType", "User") }),
                vec![]
            ),
            field("role", named("NamedType", "Role"), vec![])
        ]);
        let mut role = named("EnumTypeDefinition", "Role");
        role["values"] = json!([
            named("EnumValueDefinition", "ADMIN"),
            named("EnumValueDefinition", "MEMBER")
        ]);
        json!({ "kind": "Document", "definitions": [query, user, role] })
    }

    #[test]
    fn test_root_fields_become_endpoints() {
        let spec = GraphQlParser.parse_value(&sample()).unwrap();
        assert_eq!(spec.title, DEFAULT_TITLE);
        assert_eq!(spec.endpoints.len(), 1);
        let user = &spec.endpoints[0];
        assert_eq!(user.path, "/graphql/user");
        assert_eq!(user.method, Method::Query);
        assert_eq!(user.parameters[0].location, ParameterLocation::Query);
        assert!(user.parameters[0].required);
    }

    #[test]
    fn test_recursive_type_is_marked() {
        let spec = GraphQlParser.parse_value(&sample()).unwrap();
        assert_eq!(spec.schemas.len(), 2, "root types are not models");
        let user = spec.schemas["User"].body().unwrap();
        assert_eq!(user.required, vec!["id"]);
        let friends = user.properties["friends"].body().unwrap();
        assert_eq!(
            friends.items.as_ref().unwrap().reference_name(),
            Some("User")
        );
        assert_eq!(user.properties["role"], SchemaNode::reference("Role"));
        let role = spec.schemas["Role"].body().unwrap();
        assert_eq!(role.schema_type, Some(SchemaType::String));
        assert_eq!(role.enum_values.len(), 2);
    }

    #[test]
    fn test_envelope_names_the_api() {
        let doc = json!({ "title": "Shop", "version": 3, "document": sample() });
        let spec = GraphQlParser.parse_value(&doc).unwrap();
        assert_eq!(spec.title, "Shop");
        assert_eq!(spec.version, "3");
    }

    #[test]
    fn test_missing_definitions() {
        let err = GraphQlParser
            .parse_value(&json!({ "kind": "Document" }))
            .unwrap_err();
        assert_eq!(err.missing_fields(), &["definitions"]);
    }
}
