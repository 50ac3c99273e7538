//! A stand-in audio engine for the `record` command and integration tests:
//! plausible CPU counters that track voice load, plus an instance API the
//! burst generator can hammer. Deterministic per seed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::burst::{InstanceError, InstanceSource};
use crate::provider::{MetricsProvider, SnapshotError};
use crate::schema::keys;

const MAX_REAL_VOICES: u32 = 64;
const MAX_INSTANCES: usize = 512;

pub struct SimulatedEngine {
    rng: StdRng,

    cpu_dsp: f64,
    cpu_stream: f64,
    cpu_update: f64,
    /// Background voices that exist regardless of stress instances.
    ambient_voices: u32,

    next_handle: u64,
    live_instances: HashSet<u64>,
}

impl SimulatedEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            cpu_dsp: 4.0,
            cpu_stream: 1.2,
            cpu_update: 0.6,
            ambient_voices: 12,
            next_handle: 0,
            live_instances: HashSet::new(),
        }
    }

    fn total_voices(&self) -> u32 {
        self.ambient_voices + self.live_instances.len() as u32
    }

    /// One step of the counter random walk. CPU drifts toward a load-coupled
    /// target; ambient voice count wanders within a band.
    fn step(&mut self) {
        let shift = self.rng.gen_range(-1i32..=1);
        self.ambient_voices =
            (self.ambient_voices as i32 + shift).clamp(6, 24) as u32;

        let voices = self.total_voices() as f64;
        let drift = |current: f64, target: f64, noise: f64, rng: &mut StdRng| {
            (current + (target - current) * 0.2 + rng.gen_range(-noise..noise))
                .clamp(0.0, 100.0)
        };
        self.cpu_dsp = drift(self.cpu_dsp, 3.5 + 0.16 * voices, 0.40, &mut self.rng);
        self.cpu_stream = drift(self.cpu_stream, 1.0 + 0.015 * voices, 0.10, &mut self.rng);
        self.cpu_update = drift(self.cpu_update, 0.5 + 0.005 * voices, 0.05, &mut self.rng);
    }

    fn read_counters(&mut self) -> HashMap<String, f64> {
        self.step();
        let total = self.total_voices();
        let real = total.min(MAX_REAL_VOICES);
        let virtualized = total - real;
        HashMap::from([
            (keys::CPU_DSP.to_string(), self.cpu_dsp),
            (keys::CPU_STREAM.to_string(), self.cpu_stream),
            (keys::CPU_UPDATE.to_string(), self.cpu_update),
            (keys::VOICES_REAL.to_string(), real as f64),
            (keys::VOICES_VIRTUAL.to_string(), virtualized as f64),
        ])
    }

    fn start_voice(&mut self) -> Result<u64, InstanceError> {
        if self.live_instances.len() >= MAX_INSTANCES {
            return Err(InstanceError("instance budget exhausted".into()));
        }
        self.next_handle += 1;
        self.live_instances.insert(self.next_handle);
        Ok(self.next_handle)
    }

    fn stop_voice(&mut self, handle: u64) {
        self.live_instances.remove(&handle);
    }
}

/// Cloneable handle letting the sampler and the burst generator drive the
/// same engine from one cooperative loop.
#[derive(Clone)]
pub struct SharedEngine(Arc<Mutex<SimulatedEngine>>);

impl SharedEngine {
    pub fn new(seed: u64) -> Self {
        Self(Arc::new(Mutex::new(SimulatedEngine::new(seed))))
    }

    pub fn live_instances(&self) -> usize {
        self.0.lock().live_instances.len()
    }
}

impl MetricsProvider for SharedEngine {
    fn keys(&self) -> Vec<String> {
        keys::ALL.iter().map(|k| k.to_string()).collect()
    }

    fn snapshot(&mut self) -> Result<HashMap<String, f64>, SnapshotError> {
        Ok(self.0.lock().read_counters())
    }
}

impl InstanceSource for SharedEngine {
    type Handle = u64;

    fn start_instance(&mut self) -> Result<u64, InstanceError> {
        self.0.lock().start_voice()
    }

    fn stop_instance(&mut self, handle: u64) {
        self.0.lock().stop_voice(handle);
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_deterministic_per_seed() {
        let mut a = SimulatedEngine::new(9);
        let mut b = SimulatedEngine::new(9);
        for _ in 0..100 {
            assert_eq!(a.read_counters(), b.read_counters());
        }
    }

    #[test]
    fn virtual_voices_absorb_overflow() {
        let mut engine = SimulatedEngine::new(9);
        for _ in 0..80 {
            engine.start_voice().expect("start");
        }
        let counters = engine.read_counters();
        assert_eq!(counters[keys::VOICES_REAL], 64.0);
        assert!(counters[keys::VOICES_VIRTUAL] > 0.0);
    }

    #[test]
    fn instance_budget_is_enforced() {
        let mut engine = SimulatedEngine::new(9);
        for _ in 0..MAX_INSTANCES {
            engine.start_voice().expect("start");
        }
        assert!(engine.start_voice().is_err());
    }
}
