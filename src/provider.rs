use std::collections::HashMap;

use thiserror::Error;

/// A single failed counter query. Non-fatal: the owning session logs it,
/// skips the capture, and keeps running.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SnapshotError(pub String);

impl SnapshotError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// The consumed metrics capability: a live source of named numeric counters,
/// typically backed by an audio engine's performance API.
///
/// `snapshot()` is expected to be synchronous and fast (micro/millisecond
/// scale). A source that can block must be wrapped with a timeout by the
/// caller; this crate never threads a cancellation token through it.
pub trait MetricsProvider {
    /// The full set of counter keys this source can read.
    /// Checked against the session's metric schema before recording starts.
    fn keys(&self) -> Vec<String>;

    /// Read every counter once. All values in the returned map belong to the
    /// same instant as far as the source can guarantee.
    fn snapshot(&mut self) -> Result<HashMap<String, f64>, SnapshotError>;
}
