use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::SpecFormat;
use crate::process::ProcessorConfig;
use crate::process::chunk::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_BATCH_WIDTH};

/// Top-level project configuration loaded from `.specflow.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpecflowConfig {
    pub input: String,
    /// Declared input format; detected from the document when absent.
    pub format: Option<SpecFormat>,
    pub processing: ProcessingConfig,
    pub detection: DetectionConfig,
}

impl Default for SpecflowConfig {
    fn default() -> Self {
        Self {
            input: "openapi.yaml".to_string(),
            format: None,
            processing: ProcessingConfig::default(),
            detection: DetectionConfig::default(),
        }
    }
}

/// Chunk scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub chunk_size: usize,
    /// Upper bound on chunks in flight at once, at most 4.
    pub max_batch_width: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_batch_width: DEFAULT_MAX_BATCH_WIDTH,
        }
    }
}

impl From<ProcessingConfig> for ProcessorConfig {
    fn from(config: ProcessingConfig) -> Self {
        ProcessorConfig {
            chunk_size: config.chunk_size.max(1),
            max_batch_width: config.max_batch_width.clamp(1, DEFAULT_MAX_BATCH_WIDTH),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Added to the built-in auth header vocabulary.
    pub extra_auth_keywords: Vec<String>,
}

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = ".specflow.yaml";

/// Load config from a YAML file. Returns `None` if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<Option<SpecflowConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config = serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    Ok(Some(config))
}

/// Generate the default config file content.
pub fn default_config_content() -> &'static str {
    r#"# specflow configuration
input: openapi.yaml
format: ~            # openapi | asyncapi | postman | graphql (detected when absent)

processing:
  chunk_size: 100      # items per chunk
  max_batch_width: 4   # chunks processed concurrently (1-4)

detection:
  extra_auth_keywords: []
    # - x-tenant-pass
"#
}
