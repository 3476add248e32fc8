use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A JSON Schema type keyword value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
}

impl SchemaType {
    pub fn parse(value: &str) -> Option<SchemaType> {
        match value {
            "string" => Some(SchemaType::String),
            "number" => Some(SchemaType::Number),
            "integer" => Some(SchemaType::Integer),
            "boolean" => Some(SchemaType::Boolean),
            "array" => Some(SchemaType::Array),
            "object" => Some(SchemaType::Object),
            "null" => Some(SchemaType::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
            SchemaType::Null => "null",
        }
    }
}

/// A parsed type descriptor.
///
/// Named references that could not be expanded in place (cycles, dangling
/// pointers) stay as `Reference(name)` and are resolved lazily against
/// [`crate::model::UnifiedSpec::schemas`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaNode {
    Reference(String),
    Resolved(Box<SchemaBody>),
}

/// `additionalProperties` can be a boolean or a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Bool(bool),
    Schema(Box<SchemaNode>),
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// The body of a resolved schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaBody {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, SchemaNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,

    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<serde_json::Value>,
    #[serde(rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "is_false")]
    pub nullable: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub read_only: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub write_only: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub deprecated: bool,

    // Numeric constraints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,

    // Length constraints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,

    // Composition
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<SchemaNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<SchemaNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<SchemaNode>,
}

impl SchemaBody {
    pub fn of_type(schema_type: SchemaType) -> Self {
        Self {
            schema_type: Some(schema_type),
            ..Self::default()
        }
    }

    pub fn is_required(&self, property: &str) -> bool {
        self.required.iter().any(|r| r == property)
    }

    /// Mutable access to every direct child node.
    pub fn children_mut(&mut self) -> Vec<&mut SchemaNode> {
        let mut children: Vec<&mut SchemaNode> = self.properties.values_mut().collect();
        if let Some(items) = self.items.as_deref_mut() {
            children.push(items);
        }
        if let Some(AdditionalProperties::Schema(schema)) = self.additional_properties.as_mut() {
            children.push(schema.as_mut());
        }
        children.extend(self.all_of.iter_mut());
        children.extend(self.one_of.iter_mut());
        children.extend(self.any_of.iter_mut());
        children
    }

    /// Every direct child node.
    pub fn children(&self) -> Vec<&SchemaNode> {
        let mut children: Vec<&SchemaNode> = self.properties.values().collect();
        if let Some(items) = self.items.as_deref() {
            children.push(items);
        }
        if let Some(AdditionalProperties::Schema(schema)) = self.additional_properties.as_ref() {
            children.push(schema.as_ref());
        }
        children.extend(self.all_of.iter());
        children.extend(self.one_of.iter());
        children.extend(self.any_of.iter());
        children
    }
}

impl SchemaNode {
    pub fn reference(name: impl Into<String>) -> Self {
        SchemaNode::Reference(name.into())
    }

    pub fn resolved(body: SchemaBody) -> Self {
        SchemaNode::Resolved(Box::new(body))
    }

    pub fn of_type(schema_type: SchemaType) -> Self {
        SchemaNode::resolved(SchemaBody::of_type(schema_type))
    }

    pub fn body(&self) -> Option<&SchemaBody> {
        match self {
            SchemaNode::Resolved(body) => Some(body),
            SchemaNode::Reference(_) => None,
        }
    }

    pub fn body_mut(&mut self) -> Option<&mut SchemaBody> {
        match self {
            SchemaNode::Resolved(body) => Some(body),
            SchemaNode::Reference(_) => None,
        }
    }

    pub fn reference_name(&self) -> Option<&str> {
        match self {
            SchemaNode::Reference(name) => Some(name),
            SchemaNode::Resolved(_) => None,
        }
    }

    /// Collect every reference name reachable in this tree, in visit order.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            SchemaNode::Reference(name) => out.push(name),
            SchemaNode::Resolved(body) => {
                for child in body.children() {
                    child.collect_references(out);
                }
            }
        }
    }

    /// Rewrite every reference marker in the tree with `rename`.
    /// Returns how many markers were changed.
    pub fn rename_references(&mut self, rename: &dyn Fn(&str) -> Option<String>) -> usize {
        match self {
            SchemaNode::Reference(name) => match rename(name) {
                Some(target) if target != *name => {
                    *name = target;
                    1
                }
                _ => 0,
            },
            SchemaNode::Resolved(body) => body
                .children_mut()
                .into_iter()
                .map(|child| child.rename_references(rename))
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_serializes_as_name() {
        let node = SchemaNode::reference("Pet");
        assert_eq!(serde_json::to_string(&node).unwrap(), "\"Pet\"");
        let back: SchemaNode = serde_json::from_str("\"Pet\"").unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_body_round_trips_flags() {
        let mut body = SchemaBody::of_type(SchemaType::String);
        body.nullable = true;
        body.read_only = true;
        let node = SchemaNode::resolved(body);
        let json = serde_json::to_string(&node).unwrap();
        let back: SchemaNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
        assert!(!json.contains("write_only"));
    }

    #[test]
    fn test_rename_references_walks_nested_nodes() {
        let mut body = SchemaBody::of_type(SchemaType::Object);
        body.properties
            .insert("a".to_string(), SchemaNode::reference("Old"));
        let mut list = SchemaBody::of_type(SchemaType::Array);
        list.items = Some(Box::new(SchemaNode::reference("Old")));
        body.properties
            .insert("b".to_string(), SchemaNode::resolved(list));
        let mut node = SchemaNode::resolved(body);

        let changed = node.rename_references(&|name| {
            (name == "Old").then(|| "New".to_string())
        });
        assert_eq!(changed, 2);
        assert_eq!(node.references(), vec!["New", "New"]);
    }
}
