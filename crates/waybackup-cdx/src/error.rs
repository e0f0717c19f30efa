//! CDX client error type.

use thiserror::Error;

/// Errors from the CDX query and index-file handling.
///
/// Any of these during the initial index pull is fatal: the partially
/// written index file is removed and startup aborts.
#[derive(Debug, Error)]
pub enum CdxError {
    /// Transport-level failure while talking to the archive.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The CDX endpoint answered with a non-success status.
    #[error("CDX query failed with status {status}: {url}")]
    QueryFailed { status: u16, url: String },

    /// Filesystem failure around the index file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A malformed index line (counted by the pipeline, never fatal there).
    #[error("malformed CDX line: {0}")]
    Parse(#[from] serde_json::Error),
}
