//! State provider boundary.
//!
//! The engine treats live system state as an opaque byte payload. Whatever
//! that payload represents (a save directory archive, a display layout, a
//! config blob) is the provider's business; the engine only needs a read
//! call that produces the payload and a write call that applies one.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// External collaborator that can read live state into a payload and apply a
/// payload back onto live state. `write` must be safe to repeat with the same
/// payload: the engine retries restores after partial failures.
pub trait StateProvider {
    fn read(&self) -> io::Result<Vec<u8>>;
    fn write(&self, payload: &[u8]) -> io::Result<()>;
}

/// Provider whose live state is the contents of a single file.
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileProvider { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateProvider for FileProvider {
    fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    // write-to-temp-then-rename so an interrupted apply never leaves a
    // truncated state file behind
    fn write(&self, payload: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("swap.tmp");
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-process provider holding live state in memory. Used by tests and by
/// embedders that manage state themselves. Can be armed to fail the next
/// write once, to exercise partial-apply recovery paths.
#[derive(Default)]
pub struct MemoryProvider {
    state: parking_lot::Mutex<Vec<u8>>,
    fail_next_write: std::sync::atomic::AtomicBool,
    writes: std::sync::atomic::AtomicUsize,
}

impl MemoryProvider {
    pub fn new(initial: &[u8]) -> Self {
        MemoryProvider {
            state: parking_lot::Mutex::new(initial.to_vec()),
            ..Default::default()
        }
    }

    pub fn set_state(&self, payload: &[u8]) {
        *self.state.lock() = payload.to_vec();
    }

    pub fn state(&self) -> Vec<u8> {
        self.state.lock().clone()
    }

    /// Number of successful writes applied so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Make the next write fail with an error, leaving state unchanged.
    pub fn fail_next_write(&self) {
        self.fail_next_write
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

impl StateProvider for MemoryProvider {
    fn read(&self) -> io::Result<Vec<u8>> {
        Ok(self.state.lock().clone())
    }

    fn write(&self, payload: &[u8]) -> io::Result<()> {
        if self
            .fail_next_write
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            return Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "provider write interrupted mid-apply",
            ));
        }

        *self.state.lock() = payload.to_vec();
        self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_provider_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileProvider::new(dir.path().join("state.bin"));

        provider.write(b"live state").unwrap();
        assert_eq!(provider.read().unwrap(), b"live state");
    }

    #[test]
    fn file_provider_write_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileProvider::new(dir.path().join("state.bin"));

        provider.write(b"same payload").unwrap();
        provider.write(b"same payload").unwrap();
        assert_eq!(provider.read().unwrap(), b"same payload");
    }

    #[test]
    fn read_missing_state_fails() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileProvider::new(dir.path().join("absent.bin"));
        assert!(provider.read().is_err());
    }

    #[test]
    fn memory_provider_fails_once_then_recovers() {
        let provider = MemoryProvider::new(b"before");
        provider.fail_next_write();

        assert!(provider.write(b"after").is_err());
        assert_eq!(provider.state(), b"before");

        provider.write(b"after").unwrap();
        assert_eq!(provider.state(), b"after");
        assert_eq!(provider.write_count(), 1);
    }
}
