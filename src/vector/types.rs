//! Type-safe wrappers and core types for the vector index.
//!
//! The index is a pair of parallel sequences (record ids and their
//! embeddings). `VectorIndex` owns that pair and refuses to exist with
//! mismatched lengths or dimensions.

use crate::types::RecordId;
use thiserror::Error;

/// Dimension of the default embedding model (all-MiniLM-L6-v2).
pub const VECTOR_DIMENSION_384: usize = 384;

/// Type-safe wrapper for vector dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    #[must_use]
    pub const fn dimension_384() -> Self {
        Self(VECTOR_DIMENSION_384)
    }

    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// A record id paired with its cosine similarity to a query, in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedCandidate {
    pub id: RecordId,
    pub score: f32,
}

/// The in-memory vector index: `ids[i]` is the record embedded as `vectors[i]`.
///
/// Immutable once built. Shared between readers behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    ids: Vec<RecordId>,
    vectors: Vec<Vec<f32>>,
    dimension: VectorDimension,
}

impl VectorIndex {
    /// Builds an index, validating length parity and per-row dimension.
    pub fn new(
        ids: Vec<RecordId>,
        vectors: Vec<Vec<f32>>,
        dimension: VectorDimension,
    ) -> Result<Self, VectorError> {
        if ids.len() != vectors.len() {
            return Err(VectorError::LengthMismatch {
                ids: ids.len(),
                vectors: vectors.len(),
            });
        }
        for vector in &vectors {
            dimension.validate_vector(vector)?;
        }
        Ok(Self {
            ids,
            vectors,
            dimension,
        })
    }

    pub fn ids(&self) -> &[RecordId] {
        &self.ids
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Splits the index back into its parallel sequences.
    pub fn into_parts(self) -> (Vec<RecordId>, Vec<Vec<f32>>) {
        (self.ids, self.vectors)
    }
}

/// Errors that can occur during vector operations.
///
/// All error messages include actionable suggestions for resolution.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error(
        "Index has {ids} ids but {vectors} vectors\nSuggestion: Rebuild the index with 'inmofinder index --force'"
    )]
    LengthMismatch { ids: usize, vectors: usize },

    #[error(
        "Embedding generation failed: {0}\nSuggestion: Verify the embedding model is properly initialized"
    )]
    EmbeddingFailed(String),

    #[error(
        "Encoding timed out after {timeout_ms}ms\nSuggestion: Raise semantic_search.encode_timeout_ms or check system load"
    )]
    EncodeTimeout { timeout_ms: u128 },

    #[error(
        "Unknown embedding model '{0}'\nSuggestion: Use one of AllMiniLML6V2, ParaphraseMLMiniLML12V2, MultilingualE5Small, BGESmallENV15, BGEBaseENV15"
    )]
    UnknownModel(String),
}
