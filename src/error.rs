//! Error types for the property search engine
//!
//! `SearchError` carries the failure taxonomy of the search pipeline. All but
//! `InvalidFilterValue` are recovered inside the orchestrator; the CLI and
//! other operator surfaces see them directly.

use crate::storage::StoreError;
use crate::vector::VectorError;
use thiserror::Error;

/// Main error type for index and search operations
#[derive(Error, Debug)]
pub enum SearchError {
    /// The embedding model could not be loaded, failed, or timed out
    #[error("Encoder unavailable: {reason}")]
    EncodingUnavailable { reason: String },

    /// No usable index: load and rebuild both failed
    #[error("Vector index unavailable: {reason}")]
    IndexUnavailable {
        reason: String,
        #[source]
        cause: Option<Box<SearchError>>,
    },

    /// The persisted snapshot is structurally invalid or stale
    #[error("Index appears to be corrupted: {reason}")]
    CorruptIndex { reason: String },

    #[error("No records to index. Import listings before building the index")]
    EmptyCorpus,

    /// A caller-supplied filter failed type or range validation
    #[error("Invalid value '{value}' for filter '{field}': {reason}")]
    InvalidFilterValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Snapshot I/O failure while writing
    #[error("Failed to persist index: {reason}: {source}")]
    Persistence {
        reason: String,
        source: std::io::Error,
    },

    #[error("Record store error: {0}")]
    RecordStore(#[from] StoreError),

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl SearchError {
    /// Get a stable status code for this error type.
    ///
    /// Used in JSON output for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::EncodingUnavailable { .. } => "ENCODING_UNAVAILABLE",
            Self::IndexUnavailable { .. } => "INDEX_UNAVAILABLE",
            Self::CorruptIndex { .. } => "CORRUPT_INDEX",
            Self::EmptyCorpus => "EMPTY_CORPUS",
            Self::InvalidFilterValue { .. } => "INVALID_FILTER_VALUE",
            Self::Persistence { .. } => "PERSISTENCE_ERROR",
            Self::RecordStore(_) => "RECORD_STORE_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::EncodingUnavailable { .. } => vec![
                "Check network access for the first model download",
                "Verify the model cache directory is writable",
            ],
            Self::IndexUnavailable { .. } => vec![
                "Run 'inmofinder index --force' to build the index",
                "Searches keep working through keyword matching meanwhile",
            ],
            Self::CorruptIndex { .. } => vec![
                "Run 'inmofinder index --force' to rebuild from scratch",
                "Check for disk errors or filesystem corruption",
            ],
            Self::EmptyCorpus => vec!["Run 'inmofinder import <listings.json>' first"],
            Self::InvalidFilterValue { .. } => {
                vec!["Numeric filters take non-negative numbers, e.g. --price-max 450000000"]
            }
            Self::Persistence { .. } => vec![
                "Check disk space and permissions in the index directory",
                "The previous snapshot is still in place",
            ],
            Self::RecordStore(_) => vec!["Check the records_path setting and the file contents"],
            Self::Config { .. } => vec!["Run 'inmofinder config' to inspect effective settings"],
        }
    }

    /// Shorthand for a rejected filter value.
    pub fn invalid_filter(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidFilterValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl From<VectorError> for SearchError {
    fn from(error: VectorError) -> Self {
        match error {
            VectorError::EmbeddingFailed(_)
            | VectorError::EncodeTimeout { .. }
            | VectorError::UnknownModel(_) => Self::EncodingUnavailable {
                reason: error.to_string(),
            },
            VectorError::DimensionMismatch { .. }
            | VectorError::InvalidDimension { .. }
            | VectorError::LengthMismatch { .. } => Self::CorruptIndex {
                reason: error.to_string(),
            },
        }
    }
}

/// Result type alias for search and index operations
pub type SearchResult<T> = Result<T, SearchError>;
