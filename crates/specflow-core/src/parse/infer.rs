//! Schema inference from example payloads.
//!
//! Formats such as Postman collections carry example bodies rather than
//! schemas; the inferred schema records the observed shape only.

use serde_json::Value;

use crate::model::{SchemaBody, SchemaNode, SchemaType};

/// Infer a schema from an example JSON value.
pub fn infer_schema(example: &Value) -> SchemaNode {
    SchemaNode::resolved(infer_body(example))
}

fn infer_body(example: &Value) -> SchemaBody {
    match example {
        Value::Null => SchemaBody {
            nullable: true,
            ..SchemaBody::default()
        },
        Value::Bool(_) => SchemaBody::of_type(SchemaType::Boolean),
        Value::Number(n) if n.is_i64() || n.is_u64() => SchemaBody::of_type(SchemaType::Integer),
        Value::Number(_) => SchemaBody::of_type(SchemaType::Number),
        Value::String(s) => {
            let mut body = SchemaBody::of_type(SchemaType::String);
            body.format = string_format(s).map(str::to_string);
            body
        }
        Value::Array(items) => {
            let mut body = SchemaBody::of_type(SchemaType::Array);
            body.items = items.first().map(|first| Box::new(infer_schema(first)));
            body
        }
        Value::Object(map) => {
            let mut body = SchemaBody::of_type(SchemaType::Object);
            for (name, value) in map {
                body.properties.insert(name.clone(), infer_schema(value));
                if !value.is_null() {
                    body.required.push(name.clone());
                }
            }
            body
        }
    }
}

/// Recognize a few common string formats by shape.
fn string_format(value: &str) -> Option<&'static str> {
    let bytes = value.as_bytes();
    let is_date = bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit);
    if is_date {
        return if bytes.len() > 10 && bytes[10] == b'T' {
            Some("date-time")
        } else if bytes.len() == 10 {
            Some("date")
        } else {
            None
        };
    }
    let is_uuid = bytes.len() == 36
        && value.char_indices().all(|(i, c)| {
            let dash_slot = matches!(i, 8 | 13 | 18 | 23);
            dash_slot == (c == '-') && (c == '-' || c.is_ascii_hexdigit())
        });
    if is_uuid {
        return Some("uuid");
    }
    if value.starts_with("http://") || value.starts_with("https://") {
        return Some("uri");
    }
    let domain = value.rsplit_once('@').map(|(_, domain)| domain);
    if !value.contains(' ') && domain.is_some_and(|d| d.contains('.')) {
        return Some("email");
    }
    None
}
