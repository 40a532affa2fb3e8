//! Similarity ranker: brute-force cosine scoring over the whole index.
//!
//! Listing catalogs are small enough (thousands of rows) that an exact scan
//! beats maintaining an approximate structure. Rows are scored in parallel;
//! the final ordering is a stable sort so equal scores keep index order.

use crate::types::RecordId;
use crate::vector::{RankedCandidate, VectorError};
use rayon::prelude::*;

/// Computes cosine similarity between two vectors.
///
/// # Returns
/// * Cosine similarity in range [-1, 1], where 1 is most similar
/// * 0.0 if either vector has zero norm or the score is not finite
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    let score = dot_product / (norm_a * norm_b);
    if norm_a == 0.0 || norm_b == 0.0 || !score.is_finite() {
        0.0
    } else {
        score.clamp(-1.0, 1.0)
    }
}

/// Ranks `ids`/`vectors` by cosine similarity to `query`.
///
/// Returns at most `min(top_k, ids.len())` candidates with non-increasing
/// scores. Ties keep their position in `ids`.
///
/// # Errors
/// `LengthMismatch` if the parallel sequences differ in length and
/// `DimensionMismatch` if any row differs from the query's dimension.
pub fn rank(
    query: &[f32],
    ids: &[RecordId],
    vectors: &[Vec<f32>],
    top_k: usize,
) -> Result<Vec<RankedCandidate>, VectorError> {
    if ids.len() != vectors.len() {
        return Err(VectorError::LengthMismatch {
            ids: ids.len(),
            vectors: vectors.len(),
        });
    }
    if let Some(row) = vectors.iter().find(|row| row.len() != query.len()) {
        return Err(VectorError::DimensionMismatch {
            expected: query.len(),
            actual: row.len(),
        });
    }

    let mut scored: Vec<RankedCandidate> = ids
        .par_iter()
        .zip(vectors.par_iter())
        .map(|(&id, vector)| RankedCandidate {
            id,
            score: cosine_similarity(query, vector),
        })
        .collect();

    // Stable: equal scores stay in index order
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k.min(ids.len()));

    Ok(scored)
}
