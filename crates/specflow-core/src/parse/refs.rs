use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::{Map, Value};

use crate::model::{AdditionalProperties, SchemaBody, SchemaNode, SchemaType};

/// Resolves named schema references for exactly one parse call.
///
/// A fresh table is built per call and threaded through the parser; it is
/// never stored on a parser or shared between calls. References resolve by
/// the last segment of their pointer and always land in the tree as a
/// `Reference(name)` marker. The target body is built once, memoized under
/// its name and handed out by [`into_schemas`](Self::into_schemas), so a
/// schema reached along many paths is stored exactly once. A name that is
/// still being built is not entered again.
pub struct ReferenceTable<'doc> {
    definitions: IndexMap<String, &'doc Value>,
    resolved: HashMap<String, SchemaNode>,
    in_progress: HashSet<String>,
    dangling: Vec<String>,
}

impl<'doc> ReferenceTable<'doc> {
    pub fn new() -> Self {
        Self {
            definitions: IndexMap::new(),
            resolved: HashMap::new(),
            in_progress: HashSet::new(),
            dangling: Vec::new(),
        }
    }

    pub fn with_definitions(definitions: Option<&'doc Map<String, Value>>) -> Self {
        let mut table = Self::new();
        if let Some(definitions) = definitions {
            for (name, value) in definitions {
                table.define(name, value);
            }
        }
        table
    }

    /// Register a named schema. The first definition of a name wins.
    pub fn define(&mut self, name: &str, value: &'doc Value) {
        self.definitions.entry(name.to_string()).or_insert(value);
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Names referenced during this call that have no definition.
    pub fn dangling(&self) -> &[String] {
        &self.dangling
    }

    /// Resolve a `$ref` pointer such as `#/components/schemas/Pet` to a
    /// marker, building its target first if this call has not yet.
    pub fn resolve_pointer(&mut self, pointer: &str) -> SchemaNode {
        let name = pointer_name(pointer);
        if !self.definitions.contains_key(&name) {
            self.mark_dangling(&name);
        } else if self.in_progress.contains(&name) {
            debug!("cyclic reference to '{name}'");
        } else if !self.resolved.contains_key(&name) {
            self.resolve_named(&name);
        }
        SchemaNode::reference(name)
    }

    /// The body declared under `name`. Nested references inside it are
    /// markers. A name still being built, or one never defined, yields a
    /// marker.
    pub fn resolve_named(&mut self, name: &str) -> SchemaNode {
        if self.in_progress.contains(name) {
            return SchemaNode::reference(name);
        }
        if let Some(done) = self.resolved.get(name) {
            return done.clone();
        }
        let Some(value) = self.definitions.get(name).copied() else {
            self.mark_dangling(name);
            return SchemaNode::reference(name);
        };

        self.in_progress.insert(name.to_string());
        let node = self.build(value);
        self.in_progress.remove(name);
        self.resolved.insert(name.to_string(), node.clone());
        node
    }

    fn mark_dangling(&mut self, name: &str) {
        if !self.dangling.iter().any(|d| d == name) {
            warn!("dangling schema reference '{name}', keeping placeholder");
            self.dangling.push(name.to_string());
        }
    }

    /// Build a schema node from a raw schema value.
    pub fn build(&mut self, value: &Value) -> SchemaNode {
        let Some(obj) = value.as_object() else {
            // `true` / `{}` style schemas accept anything
            return SchemaNode::resolved(SchemaBody::default());
        };
        if let Some(pointer) = obj.get("$ref").and_then(Value::as_str) {
            return self.resolve_pointer(pointer);
        }
        SchemaNode::resolved(self.build_body(obj))
    }

    fn build_body(&mut self, obj: &Map<String, Value>) -> SchemaBody {
        let mut body = SchemaBody::default();

        match obj.get("type") {
            Some(Value::String(t)) => body.schema_type = SchemaType::parse(t),
            Some(Value::Array(types)) => {
                let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
                body.nullable = names.contains(&"null");
                body.schema_type = names
                    .iter()
                    .find(|t| **t != "null")
                    .or(names.first())
                    .and_then(|t| SchemaType::parse(t));
            }
            _ => {}
        }

        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
        let flag = |key: &str| obj.get(key).and_then(Value::as_bool).unwrap_or(false);
        let number = |key: &str| obj.get(key).and_then(Value::as_f64);
        let count = |key: &str| obj.get(key).and_then(Value::as_u64);

        body.format = text("format");
        body.title = text("title");
        body.description = text("description");
        body.pattern = text("pattern");
        body.nullable = body.nullable || flag("nullable") || flag("x-nullable");
        body.read_only = flag("readOnly");
        body.write_only = flag("writeOnly");
        body.deprecated = flag("deprecated");
        body.default_value = obj.get("default").cloned();

        body.minimum = number("minimum");
        body.maximum = number("maximum");
        body.multiple_of = number("multipleOf");
        // 3.0 uses boolean exclusivity flags, 3.1 uses the bound itself
        match obj.get("exclusiveMinimum") {
            Some(Value::Bool(true)) => body.exclusive_minimum = body.minimum.take(),
            Some(v) => body.exclusive_minimum = v.as_f64(),
            None => {}
        }
        match obj.get("exclusiveMaximum") {
            Some(Value::Bool(true)) => body.exclusive_maximum = body.maximum.take(),
            Some(v) => body.exclusive_maximum = v.as_f64(),
            None => {}
        }
        body.min_length = count("minLength");
        body.max_length = count("maxLength");
        body.min_items = count("minItems");
        body.max_items = count("maxItems");

        if let Some(values) = obj.get("enum").and_then(Value::as_array) {
            body.enum_values = values.clone();
        } else if let Some(constant) = obj.get("const") {
            body.enum_values = vec![constant.clone()];
        }

        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            for (name, prop) in props {
                let node = self.build(prop);
                body.properties.insert(name.clone(), node);
            }
        }
        if let Some(required) = obj.get("required").and_then(Value::as_array) {
            body.required = required
                .iter()
                .filter_map(|r| r.as_str().map(str::to_string))
                .collect();
        }
        if let Some(items) = obj.get("items") {
            body.items = Some(Box::new(self.build(items)));
        }
        body.additional_properties = match obj.get("additionalProperties") {
            Some(Value::Bool(b)) => Some(AdditionalProperties::Bool(*b)),
            Some(schema @ Value::Object(_)) => {
                Some(AdditionalProperties::Schema(Box::new(self.build(schema))))
            }
            _ => None,
        };

        body.all_of = self.build_list(obj.get("allOf"));
        body.one_of = self.build_list(obj.get("oneOf"));
        body.any_of = self.build_list(obj.get("anyOf"));

        if body.schema_type.is_none() && !body.properties.is_empty() {
            body.schema_type = Some(SchemaType::Object);
        }
        body
    }

    fn build_list(&mut self, value: Option<&Value>) -> Vec<SchemaNode> {
        value
            .and_then(Value::as_array)
            .map(|items| items.iter().map(|item| self.build(item)).collect())
            .unwrap_or_default()
    }

    /// Finish the call: build every registered definition not yet reached
    /// and return the named schemas in declaration order.
    pub fn into_schemas(mut self) -> IndexMap<String, SchemaNode> {
        let names: Vec<String> = self.definitions.keys().cloned().collect();
        let mut schemas = IndexMap::with_capacity(names.len());
        for name in names {
            let node = self.resolve_named(&name);
            schemas.insert(name, node);
        }
        schemas
    }
}

impl Default for ReferenceTable<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the schema name from a `$ref` pointer: its last path segment,
/// with JSON pointer escapes undone.
pub fn pointer_name(pointer: &str) -> String {
    let segment = pointer.rsplit('/').next().unwrap_or(pointer);
    let segment = segment.rsplit('#').next().unwrap_or(segment);
    segment.replace("~1", "/").replace("~0", "~")
}
