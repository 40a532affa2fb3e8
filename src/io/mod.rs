//! CLI output handling: JSON envelopes and exit codes.

pub mod exit_code;
pub mod format;

pub use exit_code::ExitCode;
pub use format::{ErrorDetails, JsonResponse, ResponseMeta, format_utc_timestamp};
