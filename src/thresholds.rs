//! Pass/fail budgets for a recording, loadable from a JSON file with the
//! same shape and defaults the CI tooling has always used.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::stats::ProfileStats;

// ─── Threshold configuration ─────────────────────────────────────

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Bound {
    pub max: f64,
    pub avg: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CpuThresholds {
    pub dsp: Bound,
    pub stream: Bound,
    pub update: Bound,
    pub total: Bound,
}

impl Default for CpuThresholds {
    fn default() -> Self {
        Self {
            dsp: Bound { max: 20.0, avg: 10.0 },
            stream: Bound { max: 5.0, avg: 2.0 },
            update: Bound { max: 2.0, avg: 1.0 },
            total: Bound { max: 25.0, avg: 15.0 },
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct VoiceThresholds {
    pub max: f64,
    pub avg: f64,
}

impl Default for VoiceThresholds {
    fn default() -> Self {
        Self { max: 64.0, avg: 32.0 }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct FmodThresholds {
    pub cpu: CpuThresholds,
    pub voices: VoiceThresholds,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FrameThresholds {
    /// ~30 FPS ceiling
    pub max: f64,
    /// ~60 FPS budget
    pub avg: f64,
}

impl Default for FrameThresholds {
    fn default() -> Self {
        Self { max: 33.0, avg: 16.6 }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct UnityThresholds {
    pub frame_ms: FrameThresholds,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub fmod: FmodThresholds,
    pub unity: UnityThresholds,
}

impl Thresholds {
    /// Load from a file if one was given and parses; fall back to defaults
    /// otherwise, the same way the original checker did.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!("no thresholds file given, using defaults");
            return Self::default();
        };
        match fs::read(path).map_err(|e| e.to_string()).and_then(|bytes| {
            serde_json::from_slice(&bytes).map_err(|e| e.to_string())
        }) {
            Ok(thresholds) => {
                info!(path = %path.display(), "loaded thresholds");
                thresholds
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load thresholds, using defaults");
                Self::default()
            }
        }
    }
}

// ─── Validation ──────────────────────────────────────────────────

/// Outcome of checking one recording's statistics against the budgets.
/// Errors fail the run; warnings do not.
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub passed_checks: Vec<String>,
}

impl ValidationOutcome {
    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty()
    }

    fn check(&mut self, name: &str, stat: &str, value: f64, limit: f64) {
        if value > limit {
            self.errors.push(format!("{name} {stat} {value:.2} > {limit:.2}"));
        } else {
            self.passed_checks
                .push(format!("{name} {stat} {value:.2} <= {limit:.2}"));
        }
    }

    fn warn_above(&mut self, name: &str, stat: &str, value: f64, limit: f64) {
        if value > limit {
            self.warnings
                .push(format!("{name} {stat} {value:.2} > {limit:.2}"));
        } else {
            self.passed_checks
                .push(format!("{name} {stat} {value:.2} <= {limit:.2}"));
        }
    }
}

/// Hard-fail on CPU ceilings and the voice/frame maxima; average voice count
/// and average frame time only warn.
pub fn validate(stats: &ProfileStats, thresholds: &Thresholds) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();
    let cpu = &thresholds.fmod.cpu;

    outcome.check("FMOD DSP CPU", "max", stats.fmod_cpu_dsp.max, cpu.dsp.max);
    outcome.check("FMOD DSP CPU", "avg", stats.fmod_cpu_dsp.avg, cpu.dsp.avg);
    outcome.check("FMOD Stream CPU", "avg", stats.fmod_cpu_stream.avg, cpu.stream.avg);
    outcome.check("FMOD Total CPU", "max", stats.fmod_cpu_total.max, cpu.total.max);

    let voices = &thresholds.fmod.voices;
    outcome.warn_above("Voices", "avg", stats.voices.avg, voices.avg);
    outcome.check("Voices", "max", stats.voices.max, voices.max);

    let frame = &thresholds.unity.frame_ms;
    outcome.warn_above("Frame", "avg", stats.unity_frame_ms.avg, frame.avg);
    outcome.check("Frame", "max", stats.unity_frame_ms.max, frame.max);

    outcome
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatSet;

    fn quiet_stats() -> ProfileStats {
        let low = StatSet::from_series(&[1.0, 1.5, 2.0]);
        ProfileStats {
            fmod_cpu_dsp: low.clone(),
            fmod_cpu_stream: low.clone(),
            fmod_cpu_update: low.clone(),
            fmod_cpu_total: low.clone(),
            voices: StatSet::from_series(&[10.0, 12.0]),
            unity_frame_ms: StatSet::from_series(&[16.0, 16.2]),
            frame_distribution: Vec::new(),
        }
    }

    #[test]
    fn defaults_match_the_reference_budgets() {
        let t = Thresholds::default();
        assert_eq!(t.fmod.cpu.dsp.max, 20.0);
        assert_eq!(t.fmod.cpu.total.avg, 15.0);
        assert_eq!(t.fmod.voices.max, 64.0);
        assert_eq!(t.unity.frame_ms.avg, 16.6);
    }

    #[test]
    fn quiet_recording_passes() {
        let outcome = validate(&quiet_stats(), &Thresholds::default());
        assert!(!outcome.has_failures());
        assert!(outcome.warnings.is_empty());
        assert!(!outcome.passed_checks.is_empty());
    }

    #[test]
    fn dsp_spike_is_an_error() {
        let mut stats = quiet_stats();
        stats.fmod_cpu_dsp = StatSet::from_series(&[5.0, 45.0]);
        let outcome = validate(&stats, &Thresholds::default());
        assert!(outcome.has_failures());
        assert!(outcome.errors.iter().any(|e| e.contains("FMOD DSP CPU max")));
    }

    #[test]
    fn high_average_voices_only_warns() {
        let mut stats = quiet_stats();
        stats.voices = StatSet::from_series(&[40.0, 44.0]); // avg 42, max 44 < 64
        let outcome = validate(&stats, &Thresholds::default());
        assert!(!outcome.has_failures());
        assert!(outcome.warnings.iter().any(|w| w.contains("Voices avg")));
    }

    #[test]
    fn voice_ceiling_is_an_error() {
        let mut stats = quiet_stats();
        stats.voices = StatSet::from_series(&[10.0, 80.0]);
        let outcome = validate(&stats, &Thresholds::default());
        assert!(outcome.has_failures());
    }

    #[test]
    fn partial_thresholds_file_keeps_other_defaults() {
        let parsed: Thresholds =
            serde_json::from_str(r#"{"fmod":{"voices":{"max":128,"avg":48}}}"#).expect("parse");
        assert_eq!(parsed.fmod.voices.max, 128.0);
        assert_eq!(parsed.fmod.cpu.dsp.max, 20.0); // untouched section
        assert_eq!(parsed.unity.frame_ms.max, 33.0);
    }
}
