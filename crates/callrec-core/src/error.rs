//! Error types for callrec-core
//!
//! Every failure in the filter pipeline is classified into exactly one of
//! four kinds: an invalid date range, a missing JSON snapshot, a backend
//! that could not be reached, or a failure once a backend was reachable.
//! The original cause is always preserved for diagnostics. There are no
//! retries anywhere in this crate; errors propagate to the caller as-is.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the library's error type
pub type Result<T> = std::result::Result<T, FilterError>;

/// Main error type for callrec-core
#[derive(Error, Debug)]
pub enum FilterError {
    /// The date-range expression failed validation
    #[error("invalid date range: {0}; expected 'YYYY-MM-DD to YYYY-MM-DD'")]
    InvalidDateRange(String),

    /// The JSON record snapshot does not exist
    #[error("record snapshot not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// A backend was unreachable at probe/connect time
    #[error("backend connection failed")]
    Connection(#[source] BackendError),

    /// A query, write, or row-processing step failed once connected
    #[error("backend operation failed")]
    Operation(#[source] BackendError),
}

impl FilterError {
    /// Classify a backend cause as a connection failure.
    pub fn connection(err: impl Into<BackendError>) -> Self {
        Self::Connection(err.into())
    }

    /// Classify a backend cause as an operation failure.
    pub fn operation(err: impl Into<BackendError>) -> Self {
        Self::Operation(err.into())
    }
}

/// Underlying backend causes wrapped by [`FilterError`]
#[derive(Error, Debug)]
pub enum BackendError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
}
