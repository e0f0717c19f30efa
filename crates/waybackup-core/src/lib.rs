//! Core domain types and port definitions for waybackup.
//!
//! Pure types only: the job configuration, the snapshot row model, URL
//! splitting rules and the progress-sink port. No I/O happens in this crate;
//! the adapter crates (`waybackup-db`, `waybackup-cdx`, `waybackup-download`)
//! depend on these definitions.

#![deny(unsafe_code)]

pub mod config;
pub mod progress;
pub mod snapshot;
pub mod url;

// Re-export commonly used types for convenience
pub use config::{BackupConfig, ConfigError, JobPaths, Mode, default_output_dir, sanitize_filename};
pub use progress::{NoopSink, ProgressSink};
pub use snapshot::{
    NT_PATH_SENTINEL, NewSnapshot, PriorResult, RESPONSE_LOCK, SnapshotRecord, SnapshotUpdate,
    archive_url,
};
pub use url::{SplitUrl, url_get_timestamp, url_split};
