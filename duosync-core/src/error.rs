//! Error types for the duosync core pipeline.

use thiserror::Error;

/// Errors that can occur while preparing a timeline computation.
///
/// The pipeline stages themselves are total functions; errors only arise
/// at the input boundary (date and timezone parsing).
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid date '{0}'. Expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// Result type alias for duosync core operations.
pub type CoreResult<T> = Result<T, CoreError>;
