pub mod operations;
pub mod schemas;
pub mod security;
pub mod spec;

pub use operations::*;
pub use schemas::*;
pub use security::*;
pub use spec::{RawSpecDocument, Server, SpecFormat, SpecItem, UnifiedSpec};
