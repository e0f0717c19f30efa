//! Index pipeline, work queue, download workers and supervisor.
//!
//! This crate turns a streamed CDX index into a persistent work set and
//! drains it with N concurrent workers:
//!
//! - [`pipeline`] - parses the index file into the store in batches, builds
//!   indexes, applies the mode filter and merges prior results
//! - [`queue`] - row-level leasing over the snapshot table
//! - [`worker`] - claim → fetch → write → commit loop with the two-level
//!   retry policy
//! - [`supervisor`] - wires everything together and owns shutdown

#![deny(unsafe_code)]

pub mod error;
pub mod fetch;
pub mod paths;
pub mod pipeline;
pub mod queue;
pub mod supervisor;
pub mod worker;

pub use error::EngineError;
pub use fetch::{FetchFault, FetchResponse, HttpFetcher, SnapshotFetcher};
pub use pipeline::{IndexPipeline, PipelineCounts};
pub use queue::WorkQueue;
pub use supervisor::{RunSummary, Supervisor};
pub use worker::{DownloadWorker, WorkerContext};
