//! Metadata tracking for vector index snapshots.
//!
//! Records which embedding model produced a snapshot, its dimension and row
//! count, so a load can reject snapshots that no longer match the
//! configuration.

use crate::error::{SearchError, SearchResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const METADATA_FILE: &str = "metadata.json";

fn now_timestamp() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Metadata for a persisted snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticMetadata {
    /// Name of the embedding model used
    pub model_name: String,

    /// Dimension of embeddings
    pub dimension: usize,

    /// Number of embeddings stored
    pub embedding_count: usize,

    /// Unix timestamp when created
    pub created_at: u64,

    /// Unix timestamp when last updated
    pub updated_at: u64,

    /// Version of the metadata format
    pub version: u32,
}

impl SemanticMetadata {
    pub const CURRENT_VERSION: u32 = 1;

    /// Create new metadata with current timestamp
    pub fn new(model_name: String, dimension: usize, embedding_count: usize) -> Self {
        let now = now_timestamp();
        Self {
            model_name,
            dimension,
            embedding_count,
            created_at: now,
            updated_at: now,
            version: Self::CURRENT_VERSION,
        }
    }

    /// Carries `created_at` forward from the previous snapshot.
    pub fn succeeding(mut self, previous: &SemanticMetadata) -> Self {
        if previous.model_name == self.model_name {
            self.created_at = previous.created_at;
        }
        self
    }

    /// Save metadata as `metadata.json` inside `dir`
    pub fn save(&self, dir: &Path) -> SearchResult<()> {
        let path = dir.join(METADATA_FILE);

        let json = serde_json::to_string_pretty(self).map_err(|e| SearchError::Persistence {
            reason: format!("Failed to serialize metadata for '{}'", path.display()),
            source: std::io::Error::other(e),
        })?;

        let write_error = |source: std::io::Error| SearchError::Persistence {
            reason: format!("Failed to write '{}'", path.display()),
            source,
        };
        let mut file = File::create(&path).map_err(write_error)?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(write_error)?;

        Ok(())
    }

    /// Load metadata from `metadata.json` inside `dir`
    pub fn load(dir: &Path) -> SearchResult<Self> {
        let path = dir.join(METADATA_FILE);

        let json = std::fs::read_to_string(&path).map_err(|e| SearchError::CorruptIndex {
            reason: format!("Failed to read '{}': {e}", path.display()),
        })?;

        let metadata: Self = serde_json::from_str(&json).map_err(|e| SearchError::CorruptIndex {
            reason: format!("Failed to parse '{}': {e}", path.display()),
        })?;

        if metadata.version > Self::CURRENT_VERSION {
            return Err(SearchError::CorruptIndex {
                reason: format!(
                    "Metadata version {} is newer than supported version {}",
                    metadata.version,
                    Self::CURRENT_VERSION
                ),
            });
        }

        Ok(metadata)
    }

    pub fn exists(dir: &Path) -> bool {
        dir.join(METADATA_FILE).exists()
    }
}
