//! The live `record` loop: drives a sampling session (and optionally the
//! burst stress generator) against the simulated engine at a fixed frame
//! rate, with Ctrl-C wired to the emergency flush path.

use std::path::PathBuf;
use std::time::Instant;

use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::burst::{BurstConfig, BurstGenerator};
use crate::error::ProfilerError;
use crate::schema::{fmod_schema, VoiceCount};
use crate::session::{Profiler, SessionConfig, SessionMetadata, SessionState};
use crate::sim::SharedEngine;
use crate::sink::FileSink;

pub struct RecordOptions {
    pub duration_secs: f64,
    pub interval_frames: u32,
    pub output: PathBuf,
    pub fps: f64,
    pub voices: VoiceCount,
    /// Run the burst generator alongside the sampler.
    pub stress: bool,
    pub seed: u64,
}

pub async fn run(options: RecordOptions) -> Result<(), ProfilerError> {
    run_with_shutdown(options, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // No signal handler available: record to completion instead.
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// The record loop with an explicit shutdown trigger. The future is polled
/// continuously across loop iterations, so a signal arriving between frames
/// is never dropped.
pub async fn run_with_shutdown(
    options: RecordOptions,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<(), ProfilerError> {
    if !(options.fps > 0.0) {
        return Err(ProfilerError::InvalidConfiguration(
            "fps must be positive".into(),
        ));
    }

    let engine = SharedEngine::new(options.seed);
    let sink = FileSink::new(options.output.clone());
    let profiler = Profiler::new(Box::new(engine.clone()), Box::new(sink));
    profiler.start(SessionConfig {
        duration_secs: options.duration_secs,
        sampling_interval_frames: options.interval_frames,
        schema: fmod_schema(options.voices),
        metadata: SessionMetadata::default(),
    })?;

    let mut burst = if options.stress {
        Some(BurstGenerator::new(
            engine.clone(),
            BurstConfig {
                burst_interval_secs: 2.0,
                burst_size: 12,
                hold_secs: 1.5,
                duration_secs: options.duration_secs,
            },
            options.seed,
        )?)
    } else {
        None
    };

    let frame = std::time::Duration::from_secs_f64(1.0 / options.fps);
    let mut ticker = tokio::time::interval(frame);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick completes immediately; consume it so every
    // delta below spans a real frame.
    ticker.tick().await;
    let mut last = Instant::now();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let delta = now.duration_since(last).as_secs_f64();
                last = now;

                if let Some(burst) = burst.as_mut() {
                    burst.tick(delta);
                }
                profiler.tick(delta);

                if profiler.state() == SessionState::Flushed {
                    break;
                }
            }
            _ = &mut shutdown => {
                warn!("interrupted, flushing partial recording to the emergency target");
                if let Some(burst) = burst.as_mut() {
                    burst.drain();
                }
                profiler.emergency_flush();
                break;
            }
        }
    }

    let progress = profiler.progress();
    info!(
        samples = progress.sample_count,
        ticks = progress.tick_count,
        elapsed_secs = progress.elapsed_secs,
        output = %options.output.display(),
        "recording finished"
    );
    if let Some(burst) = &burst {
        info!(
            instances_started = burst.total_started(),
            instances_refused = burst.total_refused(),
            "stress run finished"
        );
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────
