//! Timed burst generator for voice stress tests: starts a batch of event
//! instances on a fixed schedule, holds each for a while, then releases it.
//! Frame-driven like the sampler, so a run is reproducible for a fixed tick
//! sequence and seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ProfilerError;

/// Instance creation refused by the engine (e.g. voice budget exhausted).
/// Truncates the current burst; the schedule keeps running.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct InstanceError(pub String);

/// The consumed instance-management capability: start a playing instance,
/// get back an opaque handle, hand the handle back to stop it.
pub trait InstanceSource {
    type Handle;

    fn start_instance(&mut self) -> Result<Self::Handle, InstanceError>;
    fn stop_instance(&mut self, handle: Self::Handle);
}

#[derive(Debug, Clone, Copy)]
pub struct BurstConfig {
    /// Seconds between burst starts.
    pub burst_interval_secs: f64,
    /// Instances started per burst, before jitter.
    pub burst_size: u32,
    /// How long each instance plays before release.
    pub hold_secs: f64,
    /// Stop scheduling new bursts once this much frame time has accumulated;
    /// outstanding instances still drain on subsequent ticks.
    pub duration_secs: f64,
}

struct LiveInstance<H> {
    release_at: f64,
    handle: H,
}

pub struct BurstGenerator<S: InstanceSource> {
    source: S,
    config: BurstConfig,
    rng: StdRng,

    elapsed_secs: f64,
    next_burst_at: f64,
    live: Vec<LiveInstance<S::Handle>>,
    total_started: u64,
    total_refused: u64,
    done: bool,
}

impl<S: InstanceSource> BurstGenerator<S> {
    pub fn new(source: S, config: BurstConfig, seed: u64) -> Result<Self, ProfilerError> {
        if !(config.burst_interval_secs > 0.0) {
            return Err(ProfilerError::InvalidConfiguration(
                "burst_interval_secs must be positive".into(),
            ));
        }
        if config.burst_size < 1 {
            return Err(ProfilerError::InvalidConfiguration(
                "burst_size must be at least 1".into(),
            ));
        }
        if config.hold_secs < 0.0 || !(config.duration_secs > 0.0) {
            return Err(ProfilerError::InvalidConfiguration(
                "hold_secs must be non-negative and duration_secs positive".into(),
            ));
        }
        Ok(Self {
            source,
            config,
            rng: StdRng::seed_from_u64(seed),
            elapsed_secs: 0.0,
            next_burst_at: 0.0,
            live: Vec::new(),
            total_started: 0,
            total_refused: 0,
            done: false,
        })
    }

    /// Advance by one external frame: release expired instances, then fire
    /// the next burst if its time has come.
    pub fn tick(&mut self, delta_secs: f64) {
        if self.done {
            return;
        }
        self.elapsed_secs += delta_secs;

        // Release first so a burst on the same tick can reuse freed voices.
        let elapsed = self.elapsed_secs;
        let mut kept = Vec::with_capacity(self.live.len());
        for inst in self.live.drain(..) {
            if inst.release_at <= elapsed {
                self.source.stop_instance(inst.handle);
            } else {
                kept.push(inst);
            }
        }
        self.live = kept;

        if self.elapsed_secs < self.config.duration_secs
            && self.elapsed_secs >= self.next_burst_at
        {
            // Up to 25% extra instances per burst, deterministic per seed.
            let count = self.config.burst_size
                + self.rng.gen_range(0..=self.config.burst_size / 4);
            let mut started = 0u32;
            for _ in 0..count {
                match self.source.start_instance() {
                    Ok(handle) => {
                        self.live.push(LiveInstance {
                            release_at: self.elapsed_secs + self.config.hold_secs,
                            handle,
                        });
                        self.total_started += 1;
                        started += 1;
                    }
                    Err(e) => {
                        self.total_refused += 1;
                        warn!(error = %e, "instance start refused, burst truncated");
                        break;
                    }
                }
            }
            debug!(
                t = self.elapsed_secs,
                started,
                live = self.live.len(),
                "burst fired"
            );
            self.next_burst_at += self.config.burst_interval_secs;
        }

        if self.elapsed_secs >= self.config.duration_secs && self.live.is_empty() {
            self.done = true;
        }
    }

    /// Release everything immediately (shutdown path).
    pub fn drain(&mut self) {
        for inst in self.live.drain(..) {
            self.source.stop_instance(inst.handle);
        }
        if self.elapsed_secs >= self.config.duration_secs {
            self.done = true;
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn total_started(&self) -> u64 {
        self.total_started
    }

    pub fn total_refused(&self) -> u64 {
        self.total_refused
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Records starts/stops; refuses once `capacity` instances are live.
    struct CountingSource {
        next_id: u64,
        live: Vec<u64>,
        capacity: usize,
        started: u64,
        stopped: u64,
    }

    impl CountingSource {
        fn with_capacity(capacity: usize) -> Self {
            Self {
                next_id: 0,
                live: Vec::new(),
                capacity,
                started: 0,
                stopped: 0,
            }
        }
    }

    impl InstanceSource for CountingSource {
        type Handle = u64;

        fn start_instance(&mut self) -> Result<u64, InstanceError> {
            if self.live.len() >= self.capacity {
                return Err(InstanceError("voice budget exhausted".into()));
            }
            self.next_id += 1;
            self.live.push(self.next_id);
            self.started += 1;
            Ok(self.next_id)
        }

        fn stop_instance(&mut self, handle: u64) {
            self.live.retain(|&h| h != handle);
            self.stopped += 1;
        }
    }

    fn config() -> BurstConfig {
        BurstConfig {
            burst_interval_secs: 1.0,
            burst_size: 2, // size/4 == 0, so no jitter: deterministic counts
            hold_secs: 0.5,
            duration_secs: 3.0,
        }
    }

    #[test]
    fn schedule_is_deterministic_for_a_fixed_tick_sequence() {
        let mut gen =
            BurstGenerator::new(CountingSource::with_capacity(100), config(), 7).expect("new");

        // 3 s of 0.25 s frames → bursts at t=0.25, 1.0, 2.0; all released.
        for _ in 0..12 {
            gen.tick(0.25);
        }

        assert!(gen.is_done());
        assert_eq!(gen.total_started(), 6);
        assert_eq!(gen.live_count(), 0);
        assert_eq!(gen.total_refused(), 0);
    }

    #[test]
    fn instances_are_released_after_their_hold_time() {
        let mut gen =
            BurstGenerator::new(CountingSource::with_capacity(100), config(), 7).expect("new");

        gen.tick(0.25); // burst of 2, release due at 0.75
        assert_eq!(gen.live_count(), 2);
        gen.tick(0.25); // t = 0.50, still held
        assert_eq!(gen.live_count(), 2);
        gen.tick(0.25); // t = 0.75, released
        assert_eq!(gen.live_count(), 0);
    }

    #[test]
    fn refusal_truncates_the_burst_but_not_the_schedule() {
        let mut gen =
            BurstGenerator::new(CountingSource::with_capacity(1), config(), 7).expect("new");

        gen.tick(0.25); // wants 2, gets 1, second refused
        assert_eq!(gen.live_count(), 1);
        assert_eq!(gen.total_refused(), 1);

        for _ in 0..3 {
            gen.tick(0.25); // t = 1.0: previous released, next burst fires
        }
        assert_eq!(gen.total_started(), 2);
    }

    #[test]
    fn drain_releases_everything() {
        let mut gen = BurstGenerator::new(
            CountingSource::with_capacity(100),
            BurstConfig {
                hold_secs: 60.0,
                ..config()
            },
            7,
        )
        .expect("new");

        gen.tick(0.25);
        assert_eq!(gen.live_count(), 2);
        gen.drain();
        assert_eq!(gen.live_count(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad = BurstConfig {
            burst_interval_secs: 0.0,
            ..config()
        };
        let Err(err) = BurstGenerator::new(CountingSource::with_capacity(1), bad, 7) else {
            panic!("zero burst interval must be rejected");
        };
        assert!(matches!(err, ProfilerError::InvalidConfiguration(_)));
    }
}
