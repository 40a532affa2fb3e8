//! Vector primitives for semantic ranking.
//!
//! Embeddings come from an [`EmbeddingGenerator`]; the record corpus is kept
//! as a [`VectorIndex`] persisted by [`VectorIndexStore`] in memory-mapped
//! generation directories and ranked by brute-force cosine similarity.

mod embedding;
mod similarity;
mod storage;
mod types;

#[cfg(test)]
pub use embedding::MockEmbeddingGenerator;
pub use embedding::{
    EmbeddingGenerator, FastEmbedGenerator, LazyEmbeddingGenerator, encode_with_timeout,
    parse_embedding_model,
};
pub use similarity::{cosine_similarity, rank};
pub use storage::{IndexStatus, VectorIndexStore};
pub use types::{
    RankedCandidate, VECTOR_DIMENSION_384, VectorDimension, VectorError, VectorIndex,
};
