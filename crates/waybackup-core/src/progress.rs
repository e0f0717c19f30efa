//! Progress-sink port.
//!
//! The core tracks two counters (handled, total); rendering is owned by the
//! adapter behind this trait. Implementations must be safe for concurrent
//! callers, every download worker reports through the same sink.

/// Receiver for coarse progress events.
pub trait ProgressSink: Send + Sync {
    /// A phase with a known total begins. `prefill` positions the bar at the
    /// number of snapshots already handled by a previous run.
    fn start(&self, total: u64, prefill: u64);

    /// One unit of work finished.
    fn tick(&self);

    /// Byte-level progress without a known total (index download).
    fn bytes(&self, delta: u64);

    /// The current phase is over; release whatever is on screen.
    fn finish(&self);
}

/// Sink that swallows everything; used in tests and library embeddings.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn start(&self, _total: u64, _prefill: u64) {}
    fn tick(&self) {}
    fn bytes(&self, _delta: u64) {}
    fn finish(&self) {}
}
