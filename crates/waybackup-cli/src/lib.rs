//! CLI adapter for waybackup.
//!
//! The parser defines the flag surface, the bootstrap module is the
//! composition root (configuration derivation, tracing setup), and the sink
//! renders progress. The binary in `main.rs` only dispatches.

#![deny(unsafe_code)]

pub mod bootstrap;
pub mod parser;
pub mod sink;

pub use bootstrap::{build_config, init_tracing};
pub use parser::Cli;
pub use sink::IndicatifSink;
