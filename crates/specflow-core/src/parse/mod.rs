pub mod asyncapi;
pub(crate) mod common;
pub mod graphql;
pub mod infer;
pub mod openapi;
pub mod postman;
pub mod refs;

use log::debug;
use serde_json::Value;

use crate::error::ParseError;
use crate::model::{RawSpecDocument, SpecFormat, UnifiedSpec};

pub use asyncapi::AsyncApiParser;
pub use graphql::GraphQlParser;
pub use openapi::OpenApiParser;
pub use postman::PostmanParser;
pub use refs::ReferenceTable;

/// Converts one wire format into a [`UnifiedSpec`].
///
/// Implementations hold no state between calls; anything a parse needs,
/// including its [`ReferenceTable`], is created inside `parse`.
pub trait FormatParser: Send + Sync {
    fn format(&self) -> SpecFormat;

    /// Parse an already decoded document.
    fn parse_value(&self, document: &Value) -> Result<UnifiedSpec, ParseError>;

    /// Decode and parse text.
    fn parse(&self, text: &str) -> Result<UnifiedSpec, ParseError> {
        let document = load_value(text)?;
        self.parse_value(&document)
    }
}

/// The parser for a format.
pub fn parser_for(format: SpecFormat) -> Box<dyn FormatParser> {
    match format {
        SpecFormat::OpenApi => Box::new(OpenApiParser),
        SpecFormat::AsyncApi => Box::new(AsyncApiParser),
        SpecFormat::Postman => Box::new(PostmanParser),
        SpecFormat::GraphQl => Box::new(GraphQlParser),
    }
}

/// Parse text written in a known format.
pub fn parse(format: SpecFormat, text: &str) -> Result<UnifiedSpec, ParseError> {
    parser_for(format).parse(text)
}

/// Parse text whose format is detected from its own markers.
pub fn parse_auto(text: &str) -> Result<UnifiedSpec, ParseError> {
    let document = load_value(text)?;
    let format = detect_format(&document).ok_or_else(|| {
        ParseError::Format("unable to detect the API description format".to_string())
    })?;
    debug!("detected {format} document");
    parser_for(format).parse_value(&document)
}

/// Parse a raw document, honoring its declared format and version.
pub fn parse_document(document: RawSpecDocument) -> Result<UnifiedSpec, ParseError> {
    let value = load_value(document.text())?;
    let format = match document.format() {
        Some(format) => format,
        None => detect_format(&value).ok_or_else(|| {
            ParseError::Format("unable to detect the API description format".to_string())
        })?,
    };
    if let Some(version) = document.version() {
        if let Some(major) = supported_major(format) {
            common::check_major(format, version, major)?;
        }
    }
    parser_for(format).parse_value(&value)
}

/// Supported major version for formats with a version marker.
fn supported_major(format: SpecFormat) -> Option<&'static str> {
    match format {
        SpecFormat::OpenApi => Some("3"),
        SpecFormat::AsyncApi => Some("2"),
        SpecFormat::Postman => Some("2"),
        SpecFormat::GraphQl => None,
    }
}

/// Decode JSON or YAML text into a document value.
pub fn load_value(text: &str) -> Result<Value, ParseError> {
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if trimmed.is_empty() {
        return Err(ParseError::Format("empty document".to_string()));
    }
    let value: Value = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        serde_yaml_ng::from_str(trimmed)?
    };
    if !value.is_object() {
        return Err(ParseError::Format(
            "top level of an API description must be a mapping".to_string(),
        ));
    }
    Ok(value)
}

/// Identify the format from self-describing markers.
pub fn detect_format(document: &Value) -> Option<SpecFormat> {
    if document.get("openapi").is_some() {
        return Some(SpecFormat::OpenApi);
    }
    if document.get("asyncapi").is_some() {
        return Some(SpecFormat::AsyncApi);
    }
    let postman_schema = document
        .get("info")
        .and_then(|info| info.get("schema"))
        .and_then(Value::as_str)
        .is_some_and(|schema| schema.contains("postman"));
    if postman_schema {
        return Some(SpecFormat::Postman);
    }
    let graphql = document.get("kind").and_then(Value::as_str) == Some("Document")
        || document
            .get("document")
            .and_then(|d| d.get("kind"))
            .and_then(Value::as_str)
            == Some("Document");
    if graphql {
        return Some(SpecFormat::GraphQl);
    }
    None
}
