use thiserror::Error;

use crate::provider::SnapshotError;
use crate::sink::SinkError;

/// Unified error type for the profiling library.
///
/// Only `InvalidConfiguration` and `AlreadyRunning` are ever returned to the
/// caller; snapshot and sink failures are reported on the log channel and
/// never abort a running session.
#[derive(Debug, Error)]
pub enum ProfilerError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("a profiling session is already running or has already flushed")]
    AlreadyRunning,

    #[error("metrics source unavailable: {0}")]
    MetricsUnavailable(#[from] SnapshotError),

    #[error("sink write failed: {0}")]
    SinkWriteFailure(#[from] SinkError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_channel_error_kinds_name_the_failure() {
        let e = ProfilerError::from(SnapshotError::new("engine not initialized"));
        assert_eq!(
            e.to_string(),
            "metrics source unavailable: engine not initialized"
        );

        let e = ProfilerError::from(SinkError("disk full".into()));
        assert_eq!(e.to_string(), "sink write failed: disk full");
    }
}
