use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

/// External storage for the encoded payload.
///
/// `write` replaces the whole payload. Nothing is appended and no atomicity
/// is expected beyond that.
pub trait Sink: Send + Sync {
    fn read(&self) -> io::Result<Vec<u8>>;

    fn write(&self, bytes: &[u8]) -> io::Result<()>;
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn read(&self) -> io::Result<Vec<u8>> {
        (**self).read()
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }
}

/// A payload stored in a file on disk.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Sink for FileSink {
    fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        fs::write(&self.path, bytes)
    }
}

/// A payload held in memory. Useful for tests and for databases that are
/// seeded from a value and never need to outlive the process.
#[derive(Debug, Default)]
pub struct MemorySink {
    content: Mutex<Option<Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemorySink {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            content: Mutex::new(Some(bytes.into())),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn from_json(value: &Value) -> Self {
        Self::new(value.to_string())
    }

    /// A sink whose reads fail until something is written.
    pub fn missing() -> Self {
        Self::default()
    }

    /// The current payload, if any.
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.content
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current payload parsed as JSON.
    pub fn json(&self) -> Option<Value> {
        self.contents()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
    }

    /// Number of completed writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Sink for MemorySink {
    fn read(&self) -> io::Result<Vec<u8>> {
        self.contents()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "memory sink is empty"))
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        *self.content.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_file_sink_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temporary directory");
        let sink = FileSink::new(temp_dir.path().join("db.json"));

        let err = sink.read().expect_err("Missing file should not be readable");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        sink.write(b"{\"a\":[1]}").expect("Write failed");
        sink.write(b"{}").expect("Write failed");
        assert_eq!(sink.read().expect("Read failed"), b"{}");
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::from_json(&json!({ "nums": [1, 2, 3] }));
        assert_eq!(sink.json(), Some(json!({ "nums": [1, 2, 3] })));
        assert_eq!(sink.write_count(), 0);

        sink.write(b"{}").expect("Write failed");
        assert_eq!(sink.read().expect("Read failed"), b"{}");
        assert_eq!(sink.write_count(), 1);
    }

    #[test]
    fn test_missing_memory_sink() {
        let sink = Arc::new(MemorySink::missing());
        assert_eq!(
            sink.read().expect_err("Empty sink should not be readable").kind(),
            io::ErrorKind::NotFound
        );

        sink.write(b"[]").expect("Write failed");
        assert_eq!(Sink::read(&sink).expect("Read failed"), b"[]");
    }
}
