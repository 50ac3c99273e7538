use std::collections::HashMap;

use crate::error::ProfilerError;
use crate::provider::SnapshotError;

// ─── Provider key names ──────────────────────────────────────────

/// Counter keys exposed by an FMOD-style metrics source.
pub mod keys {
    pub const CPU_DSP: &str = "cpu.dsp";
    pub const CPU_STREAM: &str = "cpu.stream";
    pub const CPU_UPDATE: &str = "cpu.update";
    pub const VOICES_REAL: &str = "voices.real";
    pub const VOICES_VIRTUAL: &str = "voices.virtual";

    pub const ALL: &[&str] = &[CPU_DSP, CPU_STREAM, CPU_UPDATE, VOICES_REAL, VOICES_VIRTUAL];
}

// ─── Schema types ────────────────────────────────────────────────

/// How one output column is computed from the provider's raw counters.
///
/// Derived columns (`SumOf`) are evaluated against the same snapshot as the
/// readings they combine, so the stored value captures the exact summation
/// instant. Consumers must not recompute them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricDef {
    /// Copy a single provider counter verbatim.
    Reading(String),
    /// Sum several provider counters from one snapshot.
    SumOf(Vec<String>),
}

impl MetricDef {
    fn referenced_keys(&self) -> impl Iterator<Item = &str> {
        match self {
            MetricDef::Reading(k) => std::slice::from_ref(k).iter(),
            MetricDef::SumOf(ks) => ks.iter(),
        }
        .map(String::as_str)
    }
}

/// Serialized representation of a column's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Float,
    /// Rounded and written as a JSON integer (e.g. voice counts).
    Integer,
}

#[derive(Debug, Clone)]
pub struct MetricColumn {
    pub name: String,
    pub def: MetricDef,
    pub kind: MetricKind,
}

/// Ordered set of output metrics, fixed for the lifetime of a session.
/// Every sample a session records carries values in exactly this order.
#[derive(Debug, Clone, Default)]
pub struct MetricSchema {
    columns: Vec<MetricColumn>,
}

impl MetricSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: &str, def: MetricDef, kind: MetricKind) -> Self {
        self.columns.push(MetricColumn {
            name: name.into(),
            def,
            kind,
        });
        self
    }

    /// Float column copied from a single provider counter.
    pub fn reading(self, name: &str, key: &str) -> Self {
        self.column(name, MetricDef::Reading(key.into()), MetricKind::Float)
    }

    /// Float column summed from several provider counters.
    pub fn sum_of(self, name: &str, keys: &[&str]) -> Self {
        self.column(
            name,
            MetricDef::SumOf(keys.iter().map(|k| (*k).into()).collect()),
            MetricKind::Float,
        )
    }

    pub fn columns(&self) -> &[MetricColumn] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Capability check performed once at session start: every provider key a
    /// column references must be advertised by the concrete source. Replaces
    /// the runtime field-probing the original tooling did on every capture.
    pub fn validate(&self, provider_keys: &[String]) -> Result<(), ProfilerError> {
        if self.columns.is_empty() {
            return Err(ProfilerError::InvalidConfiguration(
                "metric schema has no columns".into(),
            ));
        }
        for col in &self.columns {
            for key in col.def.referenced_keys() {
                if !provider_keys.iter().any(|k| k == key) {
                    return Err(ProfilerError::InvalidConfiguration(format!(
                        "metric '{}' references unknown provider key '{}'",
                        col.name, key
                    )));
                }
            }
        }
        Ok(())
    }

    /// Evaluate every column against one snapshot, in schema order.
    /// A key missing from the snapshot fails the whole capture; the session
    /// treats that like any other unavailable-metrics tick and skips it.
    pub fn evaluate(&self, reading: &HashMap<String, f64>) -> Result<Vec<f64>, SnapshotError> {
        let fetch = |key: &str| {
            reading.get(key).copied().ok_or_else(|| {
                SnapshotError::new(format!("counter '{key}' missing from snapshot"))
            })
        };

        let mut values = Vec::with_capacity(self.columns.len());
        for col in &self.columns {
            let value = match &col.def {
                MetricDef::Reading(key) => fetch(key)?,
                MetricDef::SumOf(keys) => {
                    let mut sum = 0.0;
                    for key in keys {
                        sum += fetch(key)?;
                    }
                    sum
                }
            };
            values.push(value);
        }
        Ok(values)
    }
}

// ─── Reference FMOD schema ───────────────────────────────────────

/// Which channel counts feed the `voices` column. The original tooling never
/// settled on one formula, so it stays a configuration choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCount {
    /// Real (audible) channels only.
    Real,
    /// Real plus virtualized channels, summed at the capture instant.
    RealPlusVirtual,
}

/// The canonical column set every recording in the original format carries:
/// the three FMOD CPU components, their sum, and a voice count.
pub fn fmod_schema(voices: VoiceCount) -> MetricSchema {
    let voice_def = match voices {
        VoiceCount::Real => MetricDef::Reading(keys::VOICES_REAL.into()),
        VoiceCount::RealPlusVirtual => MetricDef::SumOf(vec![
            keys::VOICES_REAL.into(),
            keys::VOICES_VIRTUAL.into(),
        ]),
    };

    MetricSchema::new()
        .reading("fmodCpuDsp", keys::CPU_DSP)
        .reading("fmodCpuStream", keys::CPU_STREAM)
        .reading("fmodCpuUpdate", keys::CPU_UPDATE)
        .sum_of(
            "totalFmodCpu",
            &[keys::CPU_DSP, keys::CPU_STREAM, keys::CPU_UPDATE],
        )
        .column("voices", voice_def, MetricKind::Integer)
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn all_keys() -> Vec<String> {
        keys::ALL.iter().map(|k| k.to_string()).collect()
    }

    fn snapshot() -> HashMap<String, f64> {
        [
            (keys::CPU_DSP, 8.5),
            (keys::CPU_STREAM, 1.5),
            (keys::CPU_UPDATE, 0.5),
            (keys::VOICES_REAL, 20.0),
            (keys::VOICES_VIRTUAL, 4.0),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect()
    }

    #[test]
    fn fmod_schema_orders_the_canonical_columns() {
        let schema = fmod_schema(VoiceCount::Real);
        let names: Vec<&str> = schema.names().collect();
        assert_eq!(
            names,
            ["fmodCpuDsp", "fmodCpuStream", "fmodCpuUpdate", "totalFmodCpu", "voices"]
        );
    }

    #[test]
    fn total_cpu_is_summed_from_the_same_snapshot() {
        let schema = fmod_schema(VoiceCount::Real);
        let values = schema.evaluate(&snapshot()).expect("evaluate");
        assert_eq!(values, vec![8.5, 1.5, 0.5, 10.5, 20.0]);
    }

    #[test]
    fn voice_formula_is_configurable() {
        let schema = fmod_schema(VoiceCount::RealPlusVirtual);
        let values = schema.evaluate(&snapshot()).expect("evaluate");
        assert_eq!(values[4], 24.0);
    }

    #[test]
    fn unknown_provider_key_is_rejected_up_front() {
        let schema = MetricSchema::new().reading("bogus", "cpu.nonexistent");
        let err = schema.validate(&all_keys()).unwrap_err();
        assert!(matches!(err, ProfilerError::InvalidConfiguration(_)));
    }

    #[test]
    fn empty_schema_is_rejected() {
        let schema = MetricSchema::new();
        assert!(schema.validate(&all_keys()).is_err());
    }

    #[test]
    fn missing_counter_fails_the_capture() {
        let schema = fmod_schema(VoiceCount::Real);
        let mut reading = snapshot();
        reading.remove(keys::CPU_STREAM);
        assert!(schema.evaluate(&reading).is_err());
    }
}
