//! Store error type.

use thiserror::Error;

/// Errors surfaced by the persistent store and the result-file projection.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite/sqlx failure.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Result-file (CSV) parse or write failure.
    #[error("result file error: {0}")]
    ResultFile(#[from] csv::Error),

    /// Filesystem failure around the store or result file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
