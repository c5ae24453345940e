//! Checkpointed allocation store
//!
//! Same contract as [`MemoryState`], with every successful write also
//! persisted to a JSON file so allocations survive an agent restart. Reads
//! are served from memory and never touch disk.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tally_core::{AllocationRecord, AllocationTable, Error, ResourceSpec, Result, WorkloadId};
use tracing::{debug, info, warn};

use crate::memory::MemoryState;
use crate::state::{AllocationReader, AllocationWriter};

/// Current on-disk format
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    version: u32,
    allocations: AllocationTable,
}

/// Allocation store backed by a checkpoint file
///
/// A failed persist is returned to the caller; the in-memory change stays
/// applied and the next successful write brings the file up to date.
#[derive(Debug)]
pub struct CheckpointState {
    path: PathBuf,
    memory: MemoryState,
    // Serializes apply + persist so the file never goes backwards.
    store: Mutex<()>,
}

impl CheckpointState {
    /// Open (or start) the checkpoint at `path`
    ///
    /// A missing file yields an empty store.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or is corrupt
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = load(&path)?;

        info!(
            path = %path.display(),
            workloads = table.len(),
            "Restored allocation checkpoint"
        );

        Ok(Self {
            path,
            memory: MemoryState::new(table),
            store: Mutex::new(()),
        })
    }

    /// Checkpoint file location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate<T>(&self, apply: impl FnOnce(&MemoryState) -> Result<T>) -> Result<T> {
        let _guard = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        let out = apply(&self.memory)?;
        self.persist()?;
        Ok(out)
    }

    fn persist(&self) -> Result<()> {
        let checkpoint = Checkpoint {
            version: CHECKPOINT_VERSION,
            allocations: self.memory.snapshot(),
        };
        let data = serde_json::to_vec_pretty(&checkpoint)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, data).inspect_err(|e| {
            warn!(path = %tmp.display(), error = %e, "Failed to write checkpoint");
        })?;
        fs::rename(&tmp, &self.path)?;

        debug!(
            path = %self.path.display(),
            workloads = checkpoint.allocations.len(),
            "Stored allocation checkpoint"
        );
        Ok(())
    }
}

fn load(path: &Path) -> Result<AllocationTable> {
    if !path.exists() {
        debug!(path = %path.display(), "No checkpoint found, starting empty");
        return Ok(AllocationTable::new());
    }

    let data = fs::read_to_string(path)?;
    let checkpoint: Checkpoint = serde_json::from_str(&data).map_err(|e| Error::Checkpoint {
        message: format!("corrupt checkpoint {}: {e}", path.display()),
    })?;

    if checkpoint.version != CHECKPOINT_VERSION {
        return Err(Error::Checkpoint {
            message: format!(
                "unsupported checkpoint version {} (expected {CHECKPOINT_VERSION})",
                checkpoint.version
            ),
        });
    }

    Ok(checkpoint.allocations)
}

impl AllocationReader for CheckpointState {
    fn container_resources(&self, workload: &WorkloadId, container: &str) -> (ResourceSpec, bool) {
        self.memory.container_resources(workload, container)
    }

    fn aggregate_resources(&self, workload: &WorkloadId) -> ResourceSpec {
        self.memory.aggregate_resources(workload)
    }

    fn snapshot(&self) -> AllocationTable {
        self.memory.snapshot()
    }
}

impl AllocationWriter for CheckpointState {
    fn set_container_resources(
        &self,
        workload: &WorkloadId,
        container: &str,
        spec: ResourceSpec,
    ) -> Result<()> {
        self.mutate(|m| m.set_container_resources(workload, container, spec))
    }

    fn set_aggregate_resources(&self, workload: &WorkloadId, spec: ResourceSpec) -> Result<()> {
        self.mutate(|m| m.set_aggregate_resources(workload, spec))
    }

    fn set_record(&self, workload: &WorkloadId, record: AllocationRecord) -> Result<()> {
        self.mutate(|m| m.set_record(workload, record))
    }

    fn delete(&self, workload: &WorkloadId, container: &str) -> Result<()> {
        self.mutate(|m| m.delete(workload, container))
    }

    fn reclaim_orphans(&self, live: &HashSet<WorkloadId>) -> Result<Vec<WorkloadId>> {
        self.mutate(|m| m.reclaim_orphans(live))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tally_core::{Quantity, ResourceName};

    fn scratch_path(name: &str) -> PathBuf {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir()
            .join(format!("tally-checkpoint-{}-{n}", std::process::id()))
            .join(name)
    }

    fn pod(id: &str) -> WorkloadId {
        WorkloadId::new(id).unwrap()
    }

    fn mem_limit(bytes: &str) -> ResourceSpec {
        ResourceSpec::new().with_limit(ResourceName::Memory, Quantity::parse(bytes).unwrap())
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let path = scratch_path("state.json");
        let state = CheckpointState::open(&path).unwrap();
        assert!(state.snapshot().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_writes_survive_reopen() {
        let path = scratch_path("state.json");
        {
            let state = CheckpointState::open(&path).unwrap();
            state.set_aggregate_resources(&pod("a"), mem_limit("100Mi")).unwrap();
            state.set_container_resources(&pod("a"), "c1", mem_limit("50Mi")).unwrap();
            state.set_container_resources(&pod("b"), "c1", mem_limit("1Gi")).unwrap();
            state.delete(&pod("b"), "c1").unwrap();
        }

        let reopened = CheckpointState::open(&path).unwrap();
        let table = reopened.snapshot();
        assert_eq!(table.len(), 1);
        assert_eq!(reopened.aggregate_resources(&pod("a")), mem_limit("100Mi"));
        assert_eq!(reopened.container_resources(&pod("a"), "c1").0, mem_limit("50Mi"));
    }

    #[test]
    fn test_reclaim_is_persisted() {
        let path = scratch_path("state.json");
        let state = CheckpointState::open(&path).unwrap();
        state.set_container_resources(&pod("a"), "c1", mem_limit("1Mi")).unwrap();
        state.set_container_resources(&pod("b"), "c1", mem_limit("1Mi")).unwrap();

        let live: HashSet<_> = [pod("a")].into_iter().collect();
        assert_eq!(state.reclaim_orphans(&live).unwrap(), vec![pod("b")]);

        let reopened = CheckpointState::open(&path).unwrap();
        assert_eq!(reopened.snapshot().len(), 1);
    }

    #[test]
    fn test_corrupt_file_is_rejected() {
        let path = scratch_path("state.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();

        let err = CheckpointState::open(&path).unwrap_err();
        assert!(matches!(err, Error::Checkpoint { .. }));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let path = scratch_path("state.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"version": 99, "allocations": {}}"#).unwrap();

        let err = CheckpointState::open(&path).unwrap_err();
        assert!(err.to_string().contains("version 99"));
    }

    #[test]
    fn test_invalid_write_is_not_persisted() {
        let path = scratch_path("state.json");
        let state = CheckpointState::open(&path).unwrap();

        assert!(state.set_container_resources(&pod("a"), "", mem_limit("1Mi")).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_persist_keeps_change_in_memory() {
        let path = scratch_path("state.json");
        let state = CheckpointState::open(&path).unwrap();
        state.set_container_resources(&pod("a"), "c1", mem_limit("1Mi")).unwrap();

        // A directory where the temp file goes makes every write fail, even as root
        let tmp = path.with_extension("json.tmp");
        fs::create_dir_all(&tmp).unwrap();

        let err = state
            .set_container_resources(&pod("b"), "c1", mem_limit("2Mi"))
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(state.container_resources(&pod("b"), "c1"), (mem_limit("2Mi"), true));

        // The file still holds the last good state
        assert_eq!(CheckpointState::open(&path).unwrap().snapshot().len(), 1);

        // The next successful write catches the file up
        fs::remove_dir(&tmp).unwrap();
        state.set_aggregate_resources(&pod("a"), mem_limit("4Mi")).unwrap();

        let reopened = CheckpointState::open(&path).unwrap();
        assert_eq!(reopened.snapshot().len(), 2);
        assert_eq!(reopened.container_resources(&pod("b"), "c1").0, mem_limit("2Mi"));
    }
}
