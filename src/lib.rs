//! Audio-performance profiling toolkit: a fixed-duration, frame-driven
//! metrics sampler with flush-exactly-once semantics, plus the offline
//! statistics/threshold analyzer and a burst stress generator.
//!
//! The sampler is middleware-agnostic: the engine being profiled is reached
//! through the [`provider::MetricsProvider`] capability and the output file
//! through [`sink::WritableTarget`].

pub mod analyze;
pub mod burst;
pub mod error;
pub mod provider;
pub mod record;
pub mod report;
pub mod schema;
pub mod session;
pub mod sim;
pub mod sink;
pub mod stats;
pub mod thresholds;

pub use error::ProfilerError;
pub use schema::{fmod_schema, MetricSchema, VoiceCount};
pub use session::{MetricSample, Profiler, SessionConfig, SessionMetadata, SessionState};
