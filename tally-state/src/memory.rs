//! In-memory allocation store
//!
//! One reader/writer lock guards the whole table. Reads take the shared
//! side and return clones; writes take the exclusive side. Nothing under
//! the lock blocks on I/O.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tally_core::{AllocationRecord, AllocationTable, Error, ResourceSpec, Result, WorkloadId};
use tracing::{debug, info};

use crate::state::{AllocationReader, AllocationWriter};

/// Allocation table held in memory
///
/// # Example
/// ```
/// use tally_core::{Quantity, ResourceName, ResourceSpec, WorkloadId};
/// use tally_state::{AllocationReader, AllocationWriter, MemoryState};
///
/// let state = MemoryState::default();
/// let pod = WorkloadId::new("pod-a").unwrap();
/// let spec = ResourceSpec::new().with_limit(ResourceName::Cpu, Quantity::from_millis(100));
///
/// state.set_container_resources(&pod, "app", spec.clone()).unwrap();
///
/// let (found, ok) = state.container_resources(&pod, "app");
/// assert!(ok);
/// assert_eq!(found, spec);
/// ```
#[derive(Debug, Default)]
pub struct MemoryState {
    table: RwLock<AllocationTable>,
}

impl MemoryState {
    /// Create a store seeded with `initial`
    ///
    /// Records carrying no allocation are dropped.
    #[must_use]
    pub fn new(mut initial: AllocationTable) -> Self {
        initial.retain(|_, record| !record.is_empty());
        info!(
            workloads = initial.len(),
            "Initialized in-memory allocation state"
        );
        Self {
            table: RwLock::new(initial),
        }
    }

    /// Number of workloads tracked
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no workload is tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Writers never panic mid-update, so a poisoned table is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, AllocationTable> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, AllocationTable> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate_container(container: &str) -> Result<()> {
    if container.is_empty() {
        return Err(Error::InvalidConfig {
            message: "Container name cannot be empty".to_string(),
        });
    }
    Ok(())
}

impl AllocationReader for MemoryState {
    fn container_resources(&self, workload: &WorkloadId, container: &str) -> (ResourceSpec, bool) {
        self.read()
            .get(workload)
            .and_then(|record| record.containers.get(container))
            .map_or_else(|| (ResourceSpec::default(), false), |spec| (spec.clone(), true))
    }

    fn aggregate_resources(&self, workload: &WorkloadId) -> ResourceSpec {
        self.read()
            .get(workload)
            .map(|record| record.aggregate.clone())
            .unwrap_or_default()
    }

    fn snapshot(&self) -> AllocationTable {
        self.read().clone()
    }
}

impl AllocationWriter for MemoryState {
    fn set_container_resources(
        &self,
        workload: &WorkloadId,
        container: &str,
        spec: ResourceSpec,
    ) -> Result<()> {
        validate_container(container)?;

        let mut table = self.write();
        table
            .entry(workload.clone())
            .or_default()
            .containers
            .insert(container.to_string(), spec);

        debug!(workload = %workload, container, "Updated container resource allocation");
        Ok(())
    }

    fn set_aggregate_resources(&self, workload: &WorkloadId, spec: ResourceSpec) -> Result<()> {
        let mut table = self.write();
        let record = table.entry(workload.clone()).or_default();
        record.aggregate = spec;

        if record.is_empty() {
            table.remove(workload);
            debug!(workload = %workload, "Aggregate cleared on workload without containers, entry removed");
        } else {
            debug!(workload = %workload, "Updated aggregate resource allocation");
        }
        Ok(())
    }

    fn set_record(&self, workload: &WorkloadId, record: AllocationRecord) -> Result<()> {
        if let Some(container) = record.containers.keys().find(|c| c.is_empty()) {
            validate_container(container)?;
        }

        let mut table = self.write();
        if record.is_empty() {
            table.remove(workload);
            debug!(workload = %workload, "Empty record installed, entry removed");
        } else {
            table.insert(workload.clone(), record);
            debug!(workload = %workload, "Updated workload resource allocation");
        }
        Ok(())
    }

    fn delete(&self, workload: &WorkloadId, container: &str) -> Result<()> {
        let mut table = self.write();

        if container.is_empty() {
            table.remove(workload);
            debug!(workload = %workload, "Deleted workload resource allocation");
            return Ok(());
        }

        let Some(record) = table.get_mut(workload) else {
            return Ok(());
        };
        record.containers.remove(container);
        if record.containers.is_empty() {
            table.remove(workload);
        }

        debug!(workload = %workload, container, "Deleted container resource allocation");
        Ok(())
    }

    fn reclaim_orphans(&self, live: &HashSet<WorkloadId>) -> Result<Vec<WorkloadId>> {
        let mut table = self.write();
        let mut reclaimed = Vec::new();

        table.retain(|workload, _| {
            let keep = live.contains(workload);
            if !keep {
                reclaimed.push(workload.clone());
            }
            keep
        });

        if !reclaimed.is_empty() {
            info!(
                reclaimed = reclaimed.len(),
                remaining = table.len(),
                "Removed orphaned workload allocations"
            );
        }
        Ok(reclaimed)
    }
}
