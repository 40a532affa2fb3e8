//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success, including searches with no results
//! - `1`: General error
//! - `2`: Blocking error, automation should halt
//! - `3-125`: Specific recoverable errors
//! - `126-255`: Reserved by shell

use crate::error::SearchError;
use crate::storage::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// Critical failure that should halt automation
    BlockingError = 2,
    /// Nothing to operate on, e.g. an empty record store
    NotFound = 3,
    IoError = 5,
    ConfigError = 6,
    IndexCorrupted = 7,
    /// The request itself was malformed
    InvalidRequest = 9,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl ExitCode {
    /// Map a search error to the exit code scripts should see.
    pub fn from_error(error: &SearchError) -> Self {
        match error {
            SearchError::InvalidFilterValue { .. } => ExitCode::InvalidRequest,
            SearchError::IndexUnavailable {
                cause: Some(cause), ..
            } => Self::from_error(cause),
            SearchError::EmptyCorpus => ExitCode::NotFound,
            SearchError::CorruptIndex { .. } => ExitCode::IndexCorrupted,
            SearchError::Persistence { .. } => ExitCode::IoError,
            SearchError::Config { .. } => ExitCode::ConfigError,
            SearchError::RecordStore(StoreError::IdExhausted | StoreError::LockPoisoned) => {
                ExitCode::BlockingError
            }
            SearchError::RecordStore(StoreError::Read { .. } | StoreError::Write { .. }) => {
                ExitCode::IoError
            }
            _ => ExitCode::GeneralError,
        }
    }

    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, ExitCode::BlockingError)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::BlockingError => "Blocking error - automation should halt",
            ExitCode::NotFound => "Not found",
            ExitCode::IoError => "I/O error",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::IndexCorrupted => "Index corrupted",
            ExitCode::InvalidRequest => "Invalid request",
        }
    }
}
