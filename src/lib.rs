//! Semantic search over a real-estate listing catalog.
//!
//! Free-text queries are ranked by embedding similarity against a persisted
//! vector index, then narrowed by structured attribute filters, ordered and
//! paginated. When the encoder or the index is unavailable, searches fall
//! back to keyword matching.

pub mod config;
pub mod corpus;
pub mod display;
pub mod error;
pub mod io;
pub mod search;
pub mod semantic;
pub mod storage;
pub mod types;
pub mod vector;

pub use config::Settings;
pub use error::{SearchError, SearchResult};
pub use search::{SearchOrchestrator, SearchPage, SearchQuery};
pub use semantic::{CacheState, IndexCache};
pub use storage::{MemoryRecordStore, RecordStore, StoreError};
pub use types::{Record, RecordId};
pub use vector::{EmbeddingGenerator, VectorIndex, VectorIndexStore};
