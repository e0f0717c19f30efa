//! SQLite store and result-file projection for waybackup.
//!
//! One job table, one snapshot table. The snapshot table doubles as the
//! persistent work queue: workers claim rows by flipping `response` from
//! `NULL` to `LOCK` and commit terminal state back onto the row.

#![deny(unsafe_code)]

pub mod error;
pub mod repositories;
pub mod result_file;
pub mod setup;

// Re-export the pool handle so consumers don't need a direct sqlx dependency
pub use sqlx::SqlitePool;

pub use error::StoreError;
pub use repositories::{JobRepository, JobState, SnapshotRepository};
pub use result_file::ResultFile;
pub use setup::open_store;

#[cfg(any(test, feature = "test-utils"))]
pub use setup::open_test_store;
