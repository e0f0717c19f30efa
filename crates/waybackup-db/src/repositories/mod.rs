//! Repository implementations over the SQLite store.

mod job_repository;
mod row_mappers;
mod snapshot_repository;

pub use job_repository::{JobRepository, JobState};
pub use snapshot_repository::SnapshotRepository;
