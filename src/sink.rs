use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

/// A failed flush write. Logged, never retried; the session still counts as
/// flushed so a second attempt can never clobber a partially-written file.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SinkError(pub String);

/// The consumed output capability: a single-shot whole-record write.
///
/// Implementations must be atomic from the reader's perspective — a consumer
/// of the target must never observe a partially written record.
pub trait WritableTarget: Send {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SinkError>;

    /// A distinct target for the abnormal-termination path. Must never alias
    /// the primary target, so an emergency flush cannot race an in-flight
    /// normal flush over the same destination.
    fn emergency_target(&self) -> Box<dyn WritableTarget>;
}

// ─── File sink ───────────────────────────────────────────────────

/// Writes the record to a sibling temp file, then renames it into place.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `audio_profile.json` → `audio_profile.emergency.json`
    fn emergency_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "profile".into());
        self.path.with_file_name(format!("{stem}.emergency.json"))
    }
}

impl WritableTarget for FileSink {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)
            .map_err(|e| SinkError(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| SinkError(format!("rename into {}: {e}", self.path.display())))
    }

    fn emergency_target(&self) -> Box<dyn WritableTarget> {
        Box::new(FileSink::new(self.emergency_path()))
    }
}

// ─── In-memory sink ──────────────────────────────────────────────

/// Buffer-backed target for tests and embedding. Cloning yields a handle to
/// the same buffers, so a test can hold one clone and hand the other to the
/// profiler.
#[derive(Clone, Default)]
pub struct MemorySink {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    emergency_writes: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record written to the primary target, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    /// Every record written via the emergency target.
    pub fn emergency_writes(&self) -> Vec<Vec<u8>> {
        self.emergency_writes.lock().clone()
    }

    pub fn last(&self) -> Option<Vec<u8>> {
        self.writes.lock().last().cloned()
    }
}

impl WritableTarget for MemorySink {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.writes.lock().push(bytes.to_vec());
        Ok(())
    }

    fn emergency_target(&self) -> Box<dyn WritableTarget> {
        Box::new(MemorySink {
            writes: self.emergency_writes.clone(),
            emergency_writes: self.emergency_writes.clone(),
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sink_writes_whole_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audio_profile.json");
        let mut sink = FileSink::new(&path);

        sink.write_all(b"{\"samples\":[]}").expect("write");

        let contents = fs::read(&path).expect("read back");
        assert_eq!(contents, b"{\"samples\":[]}");
        // No leftover temp file
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn emergency_target_is_a_distinct_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audio_profile.json");
        let sink = FileSink::new(&path);

        let mut emergency = sink.emergency_target();
        emergency.write_all(b"partial").expect("write");

        assert!(!path.exists());
        let emergency_path = dir.path().join("audio_profile.emergency.json");
        assert_eq!(fs::read(&emergency_path).expect("read"), b"partial");
    }

    #[test]
    fn memory_sink_keeps_primary_and_emergency_separate() {
        let sink = MemorySink::new();
        let mut primary = sink.clone();
        primary.write_all(b"a").expect("write");
        primary.emergency_target().write_all(b"b").expect("write");

        assert_eq!(sink.writes(), vec![b"a".to_vec()]);
        assert_eq!(sink.emergency_writes(), vec![b"b".to_vec()]);
    }
}
