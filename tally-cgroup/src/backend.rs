//! Cgroup value writer trait for pluggable implementations

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tally_core::{Error, Result};
use tokio::fs;
use tokio::sync::Mutex;

/// Reads and writes single controller files
///
/// This allows for different implementations:
/// - [`FsWriter`] - the real cgroup v2 filesystem
/// - [`MockWriter`] - testing without filesystem
///
/// # Thread Safety
/// All implementations must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait CgroupWriter: Send + Sync {
    /// Current content of `dir/file`, trimmed; `None` if the file is missing
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read
    async fn read_value(&self, dir: &Path, file: &str) -> Result<Option<String>>;

    /// Write `value` to `dir/file`
    ///
    /// # Errors
    /// Returns error if the value cannot be written
    async fn write_value(&self, dir: &Path, file: &str, value: &str) -> Result<()>;
}

/// Writer backed by the cgroup filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWriter;

#[async_trait]
impl CgroupWriter for FsWriter {
    async fn read_value(&self, dir: &Path, file: &str) -> Result<Option<String>> {
        let path = dir.join(file);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::CGroup {
                message: format!("Read {}: {e}", path.display()),
            }),
        }
    }

    async fn write_value(&self, dir: &Path, file: &str, value: &str) -> Result<()> {
        let path = dir.join(file);
        tracing::debug!(path = %path.display(), value, "Writing cgroup value");

        fs::write(&path, value).await.map_err(|e| Error::CGroup {
            message: format!("Write {}: {e}", path.display()),
        })
    }
}

/// Mock writer for testing (doesn't touch filesystem)
///
/// # Example
/// ```
/// use std::path::Path;
/// use tally_cgroup::{CgroupWriter, MockWriter};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let writer = MockWriter::new();
/// let dir = Path::new("/sys/fs/cgroup/tally/pod1");
///
/// writer.write_value(dir, "cpu.max", "10000 100000").await.unwrap();
/// let value = writer.read_value(dir, "cpu.max").await.unwrap();
/// assert_eq!(value.as_deref(), Some("10000 100000"));
/// # });
/// ```
#[derive(Clone)]
pub struct MockWriter {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    files: HashMap<PathBuf, String>,
    read_only: bool,
    write_count: usize,
}

impl MockWriter {
    /// Create a new mock writer
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Reject every write (for testing failure paths)
    #[must_use]
    pub fn read_only() -> Self {
        let state = MockState {
            read_only: true,
            ..MockState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Seed a file's content without counting it as a write
    pub async fn seed(&self, dir: &Path, file: &str, value: &str) {
        self.state
            .lock()
            .await
            .files
            .insert(dir.join(file), value.to_string());
    }

    /// Content of `dir/file`, if any
    pub async fn value(&self, dir: &Path, file: &str) -> Option<String> {
        self.state.lock().await.files.get(&dir.join(file)).cloned()
    }

    /// Number of successful writes so far
    pub async fn write_count(&self) -> usize {
        self.state.lock().await.write_count
    }
}

impl Default for MockWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockWriter").finish_non_exhaustive()
    }
}

#[async_trait]
impl CgroupWriter for MockWriter {
    async fn read_value(&self, dir: &Path, file: &str) -> Result<Option<String>> {
        Ok(self.value(dir, file).await)
    }

    async fn write_value(&self, dir: &Path, file: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let path = dir.join(file);

        if state.read_only {
            return Err(Error::CGroup {
                message: format!("Write {}: read-only mock", path.display()),
            });
        }

        tracing::debug!(path = %path.display(), value, "Mock: wrote cgroup value");
        state.files.insert(path, value.to_string());
        state.write_count += 1;

        Ok(())
    }
}
