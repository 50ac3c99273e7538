//! The timed metrics sampler: a bounded-duration recording session driven by
//! an external per-frame `tick()`, flushed exactly once.
//!
//! The host scheduler is assumed cooperative and single-threaded, but the
//! termination signal may arrive from another thread (a process-exit hook),
//! so the whole session sits behind one `parking_lot::Mutex` and the
//! `Running → Flushed` transition doubles as the at-most-once-flush guard.

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::error::ProfilerError;
use crate::provider::MetricsProvider;
use crate::report::ProfileReport;
use crate::schema::MetricSchema;
use crate::sink::WritableTarget;

// Accumulated f64 frame deltas undershoot the nominal total (ten 0.1 s ticks
// sum to 0.9999…), so completion allows a hair of slack.
const COMPLETION_SLACK_SECS: f64 = 1e-9;

// ─── Public types ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    /// Terminal. No transition out, no second flush.
    Flushed,
}

/// Free-form identification stamped into the recording header.
#[derive(Debug, Clone)]
pub struct SessionMetadata {
    pub engine_version: String,
    pub platform: String,
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self {
            engine_version: env!("CARGO_PKG_VERSION").into(),
            platform: std::env::consts::OS.into(),
        }
    }
}

/// Immutable once `start()` accepts it.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Recording length in seconds of accumulated frame time. Must be > 0.
    pub duration_secs: f64,
    /// Capture every Nth tick. Must be ≥ 1. Sub-sampling counts frames, not
    /// wall-clock time, so the sample count is deterministic for a fixed
    /// tick sequence.
    pub sampling_interval_frames: u32,
    pub schema: MetricSchema,
    pub metadata: SessionMetadata,
}

/// One row of the time series. `values` line up with the session schema's
/// columns, so every sample in a session has the same metrics in the same
/// order by construction.
#[derive(Debug, Clone)]
pub struct MetricSample {
    /// Cumulative session time at capture.
    pub time_secs: f64,
    /// Duration of the tick that captured this sample, in milliseconds.
    pub frame_ms: f64,
    pub values: Vec<f64>,
}

/// Point-in-time view of the session counters, for drivers and tests.
#[derive(Debug, Clone, Copy)]
pub struct SessionProgress {
    pub state: SessionState,
    pub elapsed_secs: f64,
    pub tick_count: u64,
    pub sample_count: usize,
}

// ─── Profiler ────────────────────────────────────────────────────

/// Owning handle for one recording session. The tick loop and any exit hook
/// share it; both flush triggers converge on the same locked path.
pub struct Profiler {
    inner: Mutex<Inner>,
}

struct Inner {
    provider: Box<dyn MetricsProvider + Send>,
    sink: Box<dyn WritableTarget>,

    state: SessionState,
    // Meaningful only once state == Running; guarded by the state checks.
    duration_secs: f64,
    interval_frames: u64,
    schema: MetricSchema,
    metadata: SessionMetadata,

    samples: Vec<MetricSample>,
    elapsed_secs: f64,
    tick_count: u64,
}

enum FlushTarget {
    Primary,
    Emergency,
}

impl Profiler {
    pub fn new(
        provider: Box<dyn MetricsProvider + Send>,
        sink: Box<dyn WritableTarget>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                provider,
                sink,
                state: SessionState::Idle,
                duration_secs: 0.0,
                interval_frames: 1,
                schema: MetricSchema::default(),
                metadata: SessionMetadata::default(),
                samples: Vec::new(),
                elapsed_secs: 0.0,
                tick_count: 0,
            }),
        }
    }

    /// Transition `Idle → Running`. Rejects a non-positive duration, a sub-1
    /// interval, or a schema the provider cannot satisfy; on rejection the
    /// session stays `Idle` and may be started again with a fixed config.
    pub fn start(&self, config: SessionConfig) -> Result<(), ProfilerError> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Idle {
            return Err(ProfilerError::AlreadyRunning);
        }
        if !(config.duration_secs > 0.0) {
            return Err(ProfilerError::InvalidConfiguration(format!(
                "duration_secs must be positive, got {}",
                config.duration_secs
            )));
        }
        if config.sampling_interval_frames < 1 {
            return Err(ProfilerError::InvalidConfiguration(
                "sampling_interval_frames must be at least 1".into(),
            ));
        }
        config.schema.validate(&inner.provider.keys())?;

        inner.duration_secs = config.duration_secs;
        inner.interval_frames = config.sampling_interval_frames as u64;
        inner.schema = config.schema;
        inner.metadata = config.metadata;
        inner.samples.clear();
        inner.elapsed_secs = 0.0;
        inner.tick_count = 0;
        inner.state = SessionState::Running;

        info!(
            duration_secs = inner.duration_secs,
            interval_frames = inner.interval_frames,
            metrics = inner.schema.len(),
            "profiling session started"
        );
        Ok(())
    }

    /// Advance the session by one external frame. No-op unless `Running`.
    /// Never blocks beyond the provider's own snapshot cost and never
    /// propagates a failure out of the tick loop.
    pub fn tick(&self, delta_secs: f64) {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Running {
            return;
        }

        inner.tick_count += 1;
        inner.elapsed_secs += delta_secs;

        if inner.tick_count % inner.interval_frames == 0 {
            match inner.provider.snapshot() {
                Ok(reading) => match inner.schema.evaluate(&reading) {
                    Ok(values) => {
                        let sample = MetricSample {
                            time_secs: inner.elapsed_secs,
                            frame_ms: delta_secs * 1000.0,
                            values,
                        };
                        inner.samples.push(sample);
                    }
                    Err(e) => {
                        let e = ProfilerError::MetricsUnavailable(e);
                        warn!(tick = inner.tick_count, error = %e, "capture skipped");
                    }
                },
                Err(e) => {
                    let e = ProfilerError::MetricsUnavailable(e);
                    warn!(tick = inner.tick_count, error = %e, "capture skipped");
                }
            }
        }

        if inner.elapsed_secs >= inner.duration_secs - COMPLETION_SLACK_SECS {
            inner.flush(FlushTarget::Primary);
        }
    }

    /// Flush now, via the same path duration-based completion uses.
    /// Idempotent: once `Flushed`, further calls do nothing.
    pub fn force_flush(&self) {
        self.inner.lock().flush(FlushTarget::Primary);
    }

    /// Abnormal-termination flush. Writes to the sink's distinct emergency
    /// target so it cannot clobber a primary recording that may already be
    /// on disk. Idempotent like `force_flush`.
    pub fn emergency_flush(&self) {
        self.inner.lock().flush(FlushTarget::Emergency);
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn progress(&self) -> SessionProgress {
        let inner = self.inner.lock();
        SessionProgress {
            state: inner.state,
            elapsed_secs: inner.elapsed_secs,
            tick_count: inner.tick_count,
            sample_count: inner.samples.len(),
        }
    }
}

impl Inner {
    /// The single flush code path. Transitions to `Flushed` before touching
    /// the sink, so a failed write is reported but can never be retried
    /// against a half-written target.
    fn flush(&mut self, target: FlushTarget) {
        if self.state != SessionState::Running {
            return;
        }
        self.state = SessionState::Flushed;

        let report = ProfileReport {
            timestamp: Utc::now(),
            metadata: &self.metadata,
            total_duration: self.elapsed_secs,
            sampling_interval: self.interval_frames as u32,
            schema: &self.schema,
            samples: &self.samples,
        };
        let bytes = match serde_json::to_vec_pretty(&report) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "failed to serialize recording; nothing written");
                return;
            }
        };

        let result = match target {
            FlushTarget::Primary => self.sink.write_all(&bytes),
            FlushTarget::Emergency => self.sink.emergency_target().write_all(&bytes),
        };
        match result {
            Ok(()) => info!(
                samples = self.samples.len(),
                elapsed_secs = self.elapsed_secs,
                "recording flushed"
            ),
            Err(e) => {
                let e = ProfilerError::SinkWriteFailure(e);
                error!(error = %e, "flush write failed; recording lost");
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────
