//! Read and write capabilities over the allocation table
//!
//! The split lets a caller be handed an `Arc<dyn AllocationReader>` without
//! any way to mutate. Every backing store (in-memory, checkpointed) must
//! implement both halves with identical semantics.

use std::collections::HashSet;

use tally_core::{AllocationRecord, AllocationTable, ResourceSpec, Result, WorkloadId};

/// Read capability
///
/// Every returned value is an independent copy. Mutating it never changes
/// what the store holds.
pub trait AllocationReader: Send + Sync {
    /// Spec of one container, and whether it was found
    ///
    /// An absent workload or container yields an empty spec and `false`.
    fn container_resources(&self, workload: &WorkloadId, container: &str) -> (ResourceSpec, bool);

    /// Aggregate spec of a workload; empty if the workload is absent
    fn aggregate_resources(&self, workload: &WorkloadId) -> ResourceSpec;

    /// Copy of the whole table as of the call
    fn snapshot(&self) -> AllocationTable;
}

/// Write capability
///
/// Writes replace whole values: there is no field-level merge.
pub trait AllocationWriter: Send + Sync {
    /// Replace one container's spec, creating the workload entry if absent
    ///
    /// # Errors
    /// Returns error if the backing store fails to persist the change
    fn set_container_resources(
        &self,
        workload: &WorkloadId,
        container: &str,
        spec: ResourceSpec,
    ) -> Result<()>;

    /// Replace the aggregate spec, creating the workload entry if absent
    ///
    /// # Errors
    /// Returns error if the backing store fails to persist the change
    fn set_aggregate_resources(&self, workload: &WorkloadId, spec: ResourceSpec) -> Result<()>;

    /// Replace the aggregate and every container spec in one step
    ///
    /// # Errors
    /// Returns error if the backing store fails to persist the change
    fn set_record(&self, workload: &WorkloadId, record: AllocationRecord) -> Result<()>;

    /// Remove a container spec, or the whole workload if `container` is empty
    ///
    /// Removing the last container removes the workload entry even when an
    /// aggregate spec is still set.
    ///
    /// # Errors
    /// Returns error if the backing store fails to persist the change
    fn delete(&self, workload: &WorkloadId, container: &str) -> Result<()>;

    /// Remove the whole workload entry
    ///
    /// # Errors
    /// Returns error if the backing store fails to persist the change
    fn delete_workload(&self, workload: &WorkloadId) -> Result<()> {
        self.delete(workload, "")
    }

    /// Remove every workload not in `live`, returning the removed IDs
    ///
    /// # Errors
    /// Returns error if the backing store fails to persist the change
    fn reclaim_orphans(&self, live: &HashSet<WorkloadId>) -> Result<Vec<WorkloadId>>;
}

/// Full read/write access
pub trait AllocationState: AllocationReader + AllocationWriter {}

impl<T: AllocationReader + AllocationWriter + ?Sized> AllocationState for T {}
