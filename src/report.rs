//! The on-disk recording format and its reference reader.
//!
//! The write side serializes straight out of a finished session; the read
//! side is what the analyzer (and any external consumer) parses back. Field
//! names are frozen: downstream threshold tooling matches on them literally.

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::schema::{MetricKind, MetricSchema};
use crate::session::{MetricSample, SessionMetadata};

// ─── Write side ──────────────────────────────────────────────────

/// One complete flushed recording, borrowed from the owning session.
pub struct ProfileReport<'a> {
    pub timestamp: DateTime<Utc>,
    pub metadata: &'a SessionMetadata,
    pub total_duration: f64,
    pub sampling_interval: u32,
    pub schema: &'a MetricSchema,
    pub samples: &'a [MetricSample],
}

impl Serialize for ProfileReport<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(7))?;
        map.serialize_entry("timestamp", &self.timestamp.to_rfc3339())?;
        map.serialize_entry("unityVersion", &self.metadata.engine_version)?;
        map.serialize_entry("platform", &self.metadata.platform)?;
        map.serialize_entry("sampleCount", &(self.samples.len() as u64))?;
        map.serialize_entry("totalDuration", &self.total_duration)?;
        map.serialize_entry("samplingInterval", &self.sampling_interval)?;
        map.serialize_entry(
            "samples",
            &SampleRows {
                schema: self.schema,
                samples: self.samples,
            },
        )?;
        map.end()
    }
}

struct SampleRows<'a> {
    schema: &'a MetricSchema,
    samples: &'a [MetricSample],
}

impl Serialize for SampleRows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.samples.len()))?;
        for sample in self.samples {
            seq.serialize_element(&SampleRow {
                schema: self.schema,
                sample,
            })?;
        }
        seq.end()
    }
}

struct SampleRow<'a> {
    schema: &'a MetricSchema,
    sample: &'a MetricSample,
}

impl Serialize for SampleRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let columns = self.schema.columns();
        let mut map = serializer.serialize_map(Some(2 + columns.len()))?;
        map.serialize_entry("time", &self.sample.time_secs)?;
        map.serialize_entry("unityFrameMs", &self.sample.frame_ms)?;
        for (col, value) in columns.iter().zip(&self.sample.values) {
            match col.kind {
                MetricKind::Float => map.serialize_entry(&col.name, value)?,
                MetricKind::Integer => {
                    map.serialize_entry(&col.name, &(value.round() as i64))?
                }
            }
        }
        map.end()
    }
}

// ─── Read side ───────────────────────────────────────────────────

/// A recording parsed back from JSON. Metadata fields tolerate absence the
/// same way the threshold tooling always has.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordedProfile {
    #[serde(default = "unknown")]
    pub timestamp: String,
    #[serde(rename = "unityVersion", default = "unknown")]
    pub engine_version: String,
    #[serde(default = "unknown")]
    pub platform: String,
    #[serde(rename = "sampleCount")]
    sample_count: Option<u64>,
    #[serde(rename = "totalDuration", default)]
    pub total_duration: f64,
    #[serde(rename = "samplingInterval", default = "default_interval")]
    pub sampling_interval: u32,
    #[serde(default)]
    pub samples: Vec<RecordedSample>,
}

fn unknown() -> String {
    "unknown".into()
}
fn default_interval() -> u32 {
    1
}

impl RecordedProfile {
    pub fn sample_count(&self) -> u64 {
        self.sample_count.unwrap_or(self.samples.len() as u64)
    }

    /// One metric as a time series, in sample order. Missing fields read as
    /// zero rather than failing the whole file.
    pub fn series(&self, name: &str) -> Vec<f64> {
        self.samples.iter().map(|s| s.metric(name)).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordedSample {
    #[serde(default)]
    pub time: f64,
    #[serde(rename = "unityFrameMs", default)]
    pub frame_ms: f64,
    /// Every remaining field, in file order (`serde_json` is built with
    /// `preserve_order`).
    #[serde(flatten)]
    pub metrics: serde_json::Map<String, Value>,
}

impl RecordedSample {
    pub fn metric(&self, name: &str) -> f64 {
        self.metrics.get(name).and_then(Value::as_f64).unwrap_or(0.0)
    }

    pub fn metric_names(&self) -> Vec<&str> {
        self.metrics.keys().map(String::as_str).collect()
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{fmod_schema, VoiceCount};

    fn sample(time: f64, values: Vec<f64>) -> MetricSample {
        MetricSample {
            time_secs: time,
            frame_ms: 16.0,
            values,
        }
    }

    fn report_json(samples: &[MetricSample]) -> Value {
        let schema = fmod_schema(VoiceCount::Real);
        let report = ProfileReport {
            timestamp: Utc::now(),
            metadata: &SessionMetadata::default(),
            total_duration: 2.0,
            sampling_interval: 1,
            schema: &schema,
            samples,
        };
        serde_json::to_value(&report).expect("serialize")
    }

    #[test]
    fn sample_rows_carry_fields_in_schema_order() {
        let json = report_json(&[sample(0.5, vec![8.0, 1.0, 0.5, 9.5, 12.0])]);
        let row = json["samples"][0].as_object().expect("object");
        let keys: Vec<&String> = row.keys().collect();
        assert_eq!(
            keys,
            ["time", "unityFrameMs", "fmodCpuDsp", "fmodCpuStream", "fmodCpuUpdate", "totalFmodCpu", "voices"]
        );
    }

    #[test]
    fn voice_counts_serialize_as_integers() {
        let json = report_json(&[sample(0.5, vec![8.0, 1.0, 0.5, 9.5, 12.0])]);
        assert!(json["samples"][0]["voices"].is_i64());
        assert_eq!(json["samples"][0]["voices"], 12);
    }

    #[test]
    fn round_trip_preserves_count_order_and_values() {
        let samples = vec![
            sample(0.5, vec![8.0, 1.0, 0.5, 9.5, 12.0]),
            sample(1.0, vec![9.25, 1.5, 0.75, 11.5, 17.0]),
        ];
        let bytes = serde_json::to_vec(&report_json(&samples)).expect("bytes");

        let parsed: RecordedProfile = serde_json::from_slice(&bytes).expect("parse");
        assert_eq!(parsed.sample_count(), 2);
        assert_eq!(parsed.samples[0].time, 0.5);
        assert_eq!(parsed.samples[1].time, 1.0);
        assert_eq!(parsed.series("fmodCpuDsp"), vec![8.0, 9.25]);
        assert_eq!(parsed.series("totalFmodCpu"), vec![9.5, 11.5]);
        assert_eq!(parsed.series("voices"), vec![12.0, 17.0]);
        // Same name set, same order, in every row
        for s in &parsed.samples {
            assert_eq!(
                s.metric_names(),
                ["fmodCpuDsp", "fmodCpuStream", "fmodCpuUpdate", "totalFmodCpu", "voices"]
            );
        }
    }

    #[test]
    fn reader_tolerates_missing_metadata() {
        let parsed: RecordedProfile =
            serde_json::from_str(r#"{"samples":[{"time":0.1,"unityFrameMs":16.0}]}"#)
                .expect("parse");
        assert_eq!(parsed.engine_version, "unknown");
        assert_eq!(parsed.sampling_interval, 1);
        assert_eq!(parsed.sample_count(), 1);
        assert_eq!(parsed.series("fmodCpuDsp"), vec![0.0]);
    }
}
