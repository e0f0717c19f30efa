//! Engine error type.

use thiserror::Error;

use waybackup_cdx::CdxError;
use waybackup_db::StoreError;

/// Errors that abort the supervisor (everything else is recorded on the
/// affected snapshot row instead of propagating).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cdx(#[from] CdxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
