use hdrhistogram::Histogram;
use serde::Serialize;

use crate::report::RecordedProfile;

// ─── Configuration ───────────────────────────────────────────────

/// HdrHistogram range for frame times: 1 μs → 60 s, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

// ─── Per-series statistics ───────────────────────────────────────

/// Summary statistics for one metric's time series. Percentiles are taken by
/// rank on the sorted series, matching what the downstream threshold checks
/// have always been calibrated against.
#[derive(Debug, Clone, Serialize)]
pub struct StatSet {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
    pub count: u64,
}

impl StatSet {
    pub fn from_series(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::empty();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();

        let avg = sorted.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };

        let rank = |q: f64| sorted[((n as f64 * q) as usize).min(n - 1)];

        Self {
            min: sorted[0],
            max: sorted[n - 1],
            avg,
            median,
            p95: rank(0.95),
            p99: rank(0.99),
            count: n as u64,
        }
    }

    pub fn empty() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            avg: 0.0,
            median: 0.0,
            p95: 0.0,
            p99: 0.0,
            count: 0,
        }
    }
}

// ─── Frame-time distribution ─────────────────────────────────────

/// A bucket in the frame-duration histogram.
#[derive(Debug, Clone, Serialize)]
pub struct DistBucket {
    pub range_start_us: u64,
    pub range_end_us: u64,
    pub count: u64,
}

/// Bucket boundaries (μs), oriented around common frame budgets:
/// 240 / 120 / 60 / 45 / 30 / 20 / 10 FPS and below.
const DIST_BOUNDARIES: &[u64] = &[
    4_167, 8_333, 16_667, 22_222, 33_333, 50_000, 100_000, 250_000,
];

/// Bucket every recorded frame time for the report's distribution table.
fn frame_distribution(frame_ms: &[f64]) -> Vec<DistBucket> {
    let mut hist = match Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG) {
        Ok(h) => h,
        Err(_) => return Vec::new(),
    };
    for &ms in frame_ms {
        let us = ((ms * 1000.0) as u64).clamp(HIST_LOW, HIST_HIGH);
        let _ = hist.record(us);
    }
    if hist.len() == 0 {
        return Vec::new();
    }

    let num_buckets = DIST_BOUNDARIES.len() + 1; // +1 for overflow
    let mut counts = vec![0u64; num_buckets];

    for iv in hist.iter_recorded() {
        let val = iv.value_iterated_to();
        let cnt = iv.count_at_value();

        // binary_search gives us the first boundary >= val
        let idx = match DIST_BOUNDARIES.binary_search(&val) {
            Ok(i) => i,
            Err(i) => i,
        };
        counts[idx.min(DIST_BOUNDARIES.len())] += cnt;
    }

    let mut result = Vec::with_capacity(num_buckets);
    let mut prev = 0u64;
    for (i, &boundary) in DIST_BOUNDARIES.iter().enumerate() {
        if counts[i] > 0 {
            result.push(DistBucket {
                range_start_us: prev,
                range_end_us: boundary,
                count: counts[i],
            });
        }
        prev = boundary;
    }
    if counts[DIST_BOUNDARIES.len()] > 0 {
        result.push(DistBucket {
            range_start_us: prev,
            range_end_us: hist.max(),
            count: counts[DIST_BOUNDARIES.len()],
        });
    }
    result
}

// ─── Whole-recording statistics ──────────────────────────────────

/// The complete statistics block the analyzer validates and reports.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileStats {
    pub fmod_cpu_dsp: StatSet,
    pub fmod_cpu_stream: StatSet,
    pub fmod_cpu_update: StatSet,
    pub fmod_cpu_total: StatSet,
    pub voices: StatSet,
    pub unity_frame_ms: StatSet,
    pub frame_distribution: Vec<DistBucket>,
}

impl ProfileStats {
    pub fn compute(profile: &RecordedProfile) -> Self {
        let frame_ms: Vec<f64> = profile.samples.iter().map(|s| s.frame_ms).collect();
        Self {
            fmod_cpu_dsp: StatSet::from_series(&profile.series("fmodCpuDsp")),
            fmod_cpu_stream: StatSet::from_series(&profile.series("fmodCpuStream")),
            fmod_cpu_update: StatSet::from_series(&profile.series("fmodCpuUpdate")),
            fmod_cpu_total: StatSet::from_series(&profile.series("totalFmodCpu")),
            voices: StatSet::from_series(&profile.series("voices")),
            unity_frame_ms: StatSet::from_series(&frame_ms),
            frame_distribution: frame_distribution(&frame_ms),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn stat_set_over_one_to_one_hundred() {
        let values: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        let stats = StatSet::from_series(&values);

        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 100.0);
        assert_relative_eq!(stats.avg, 50.5);
        assert_relative_eq!(stats.median, 50.5);
        assert_eq!(stats.p95, 96.0);
        assert_eq!(stats.p99, 100.0);
        assert_eq!(stats.count, 100);
    }

    #[test]
    fn stat_set_odd_length_median() {
        let stats = StatSet::from_series(&[3.0, 1.0, 2.0]);
        assert_eq!(stats.median, 2.0);
    }

    #[test]
    fn empty_series_is_all_zeros() {
        let stats = StatSet::from_series(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.max, 0.0);
    }

    #[test]
    fn percentile_rank_is_clamped_for_short_series() {
        let stats = StatSet::from_series(&[5.0]);
        assert_eq!(stats.p95, 5.0);
        assert_eq!(stats.p99, 5.0);
    }

    #[test]
    fn frame_distribution_buckets_sixty_fps_frames() {
        // 16.0 ms frames land in the 8_333..16_667 μs bucket
        let buckets = frame_distribution(&[16.0; 50]);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].range_end_us, 16_667);
        assert_eq!(buckets[0].count, 50);
    }

    #[test]
    fn frame_distribution_overflow_bucket() {
        let buckets = frame_distribution(&[500.0]); // half-second hitch
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].range_start_us, 250_000);
        assert_eq!(buckets[0].count, 1);
    }
}
