//! Progress reporting for benchmark runs.
//!
//! The harness reports one unit of progress per query through
//! [`ProgressCallback`]; the CLI supplies an `indicatif` implementation and
//! tests use [`NullProgress`].

/// Receives progress updates from a running benchmark.
pub trait ProgressCallback: Send + Sync {
    /// Set the number of queries that will run.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` queries.
    fn inc(&self, delta: u64);

    /// Update the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Mark the run complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}
