use thiserror::Error;

use crate::model::SpecFormat;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed document: {0}")]
    Format(String),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("unsupported {format} version: {version}")]
    UnsupportedVersion { format: SpecFormat, version: String },

    #[error("invalid {format} document, missing required fields: {}", missing.join(", "))]
    Validation {
        format: SpecFormat,
        missing: Vec<String>,
    },
}

impl ParseError {
    /// Every missing field for a validation failure, empty otherwise.
    pub fn missing_fields(&self) -> &[String] {
        match self {
            ParseError::Validation { missing, .. } => missing,
            _ => &[],
        }
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("processing was cancelled")]
    Cancelled,

    #[error("chunk task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("process error: {0}")]
    Process(#[from] ProcessError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml_ng::Error,
    },
}
