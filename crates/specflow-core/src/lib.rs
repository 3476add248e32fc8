pub mod analyze;
pub mod config;
pub mod detect;
pub mod error;
pub mod model;
pub mod parse;
pub mod pipeline;
pub mod process;
pub mod transform;

pub use error::{ConfigError, ParseError, PipelineError, ProcessError};
pub use model::{RawSpecDocument, SpecFormat, UnifiedSpec};
pub use pipeline::{IngestOutcome, ingest};
