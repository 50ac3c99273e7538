//! Offline analysis of a flushed recording: statistics, threshold checks,
//! console report, and a machine-readable `report.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::report::RecordedProfile;
use crate::stats::ProfileStats;
use crate::thresholds::{validate, Thresholds, ValidationOutcome};

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("no samples found in profiler output")]
    NoSamples,
}

pub struct AnalyzeOptions {
    pub input: PathBuf,
    pub thresholds: Option<PathBuf>,
    /// Where the structured report lands.
    pub report: PathBuf,
}

pub struct Analysis {
    pub profile: RecordedProfile,
    pub stats: ProfileStats,
    pub outcome: ValidationOutcome,
}

impl Analysis {
    pub fn passed(&self) -> bool {
        !self.outcome.has_failures()
    }
}

/// Full pipeline: load → stats → validate → print → write report.
/// Returns the analysis so callers can inspect the verdict; a failed report
/// write is logged, not fatal, since the console output already happened.
pub fn run(options: &AnalyzeOptions) -> Result<Analysis, AnalyzeError> {
    let profile = load_profile(&options.input)?;
    if profile.samples.is_empty() {
        return Err(AnalyzeError::NoSamples);
    }
    info!(
        samples = profile.samples.len(),
        input = %options.input.display(),
        "processing recording"
    );

    let thresholds = Thresholds::load_or_default(options.thresholds.as_deref());
    let stats = ProfileStats::compute(&profile);
    let outcome = validate(&stats, &thresholds);

    print_report(&profile, &stats, &outcome);

    let report = json!({
        "metadata": {
            "timestamp": &profile.timestamp,
            "unityVersion": &profile.engine_version,
            "platform": &profile.platform,
            "sampleCount": profile.sample_count(),
            "totalDuration": profile.total_duration,
            "samplingInterval": profile.sampling_interval,
        },
        "statistics": &stats,
        "validation": {
            "passed": !outcome.has_failures(),
            "errors": &outcome.errors,
            "warnings": &outcome.warnings,
        },
    });
    match serde_json::to_vec_pretty(&report) {
        Ok(bytes) => {
            if let Err(e) = fs::write(&options.report, bytes) {
                warn!(path = %options.report.display(), error = %e, "failed to save report");
            } else {
                info!(path = %options.report.display(), "detailed report saved");
            }
        }
        Err(e) => warn!(error = %e, "failed to serialize report"),
    }

    Ok(Analysis {
        profile,
        stats,
        outcome,
    })
}

pub fn load_profile(path: &Path) -> Result<RecordedProfile, AnalyzeError> {
    let bytes = fs::read(path).map_err(|source| AnalyzeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| AnalyzeError::Json {
        path: path.to_path_buf(),
        source,
    })
}

// ─── Console report ──────────────────────────────────────────────

fn print_report(profile: &RecordedProfile, stats: &ProfileStats, outcome: &ValidationOutcome) {
    println!();
    println!("════════════════ AUDIO PERFORMANCE REPORT ════════════════");
    println!();
    println!("  recorded:   {}", profile.timestamp);
    println!("  engine:     {}", profile.engine_version);
    println!("  platform:   {}", profile.platform);
    println!(
        "  samples:    {} over {:.2}s (every {} frame(s))",
        profile.sample_count(),
        profile.total_duration,
        profile.sampling_interval,
    );
    println!();

    let rows = [
        ("FMOD DSP CPU %", &stats.fmod_cpu_dsp),
        ("FMOD Stream CPU %", &stats.fmod_cpu_stream),
        ("FMOD Update CPU %", &stats.fmod_cpu_update),
        ("FMOD Total CPU %", &stats.fmod_cpu_total),
        ("Voices", &stats.voices),
        ("Frame (ms)", &stats.unity_frame_ms),
    ];
    println!(
        "  {:<18} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "", "min", "avg", "median", "p95", "max"
    );
    for (name, s) in rows {
        println!(
            "  {:<18} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8.2}",
            name, s.min, s.avg, s.median, s.p95, s.max
        );
    }

    if !stats.frame_distribution.is_empty() {
        println!();
        println!("  Frame-time distribution:");
        for b in &stats.frame_distribution {
            println!(
                "    {:>7} – {:>7} μs  {:>6}",
                b.range_start_us, b.range_end_us, b.count
            );
        }
    }

    for (label, msgs) in [
        ("passed", &outcome.passed_checks),
        ("WARNING", &outcome.warnings),
        ("FAILED", &outcome.errors),
    ] {
        if msgs.is_empty() {
            continue;
        }
        println!();
        for msg in msgs {
            println!("  [{label}] {msg}");
        }
    }

    println!();
    if outcome.has_failures() {
        println!("RESULT: FAIL");
    } else {
        println!("RESULT: PASS");
    }
    println!("═══════════════════════════════════════════════════════════");
}
