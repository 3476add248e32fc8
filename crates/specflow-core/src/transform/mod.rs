pub mod dedup;
pub mod emit;
pub mod name_normalizer;
pub mod normalize;
pub mod schema_resolver;

pub use dedup::{DedupReport, deduplicate};
pub use emit::{to_canonical_openapi, to_openapi};
pub use normalize::{normalize_endpoint, normalize_item, normalize_model};
pub use schema_resolver::{SchemaResolver, canonical_json};
