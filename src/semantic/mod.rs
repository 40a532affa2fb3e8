//! Semantic index lifecycle: snapshot metadata and the process-wide cache
//! that loads or rebuilds the vector index on demand.

mod cache;
mod metadata;

pub use cache::{CacheState, IndexCache};
pub use metadata::SemanticMetadata;
