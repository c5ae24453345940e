//! Source of the workloads currently running on the node

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tally_core::{Result, WorkloadId};
use tokio::sync::Mutex;

/// Tells the orphan sweep which workloads are still live
#[async_trait]
pub trait LiveWorkloads: Send + Sync {
    /// Current set of live workloads
    ///
    /// # Errors
    /// Returns error if the set cannot be determined; the sweep is then
    /// skipped rather than run against a partial set
    async fn live_workloads(&self) -> Result<HashSet<WorkloadId>>;
}

/// A live set maintained by the caller
#[derive(Debug, Clone, Default)]
pub struct LiveSet {
    inner: Arc<Mutex<HashSet<WorkloadId>>>,
}

impl LiveSet {
    /// Create an empty live set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a workload live
    pub async fn insert(&self, workload: WorkloadId) {
        self.inner.lock().await.insert(workload);
    }

    /// Mark a workload gone
    pub async fn remove(&self, workload: &WorkloadId) {
        self.inner.lock().await.remove(workload);
    }
}

impl FromIterator<WorkloadId> for LiveSet {
    fn from_iter<I: IntoIterator<Item = WorkloadId>>(iter: I) -> Self {
        Self {
            inner: Arc::new(Mutex::new(iter.into_iter().collect())),
        }
    }
}

#[async_trait]
impl LiveWorkloads for LiveSet {
    async fn live_workloads(&self) -> Result<HashSet<WorkloadId>> {
        Ok(self.inner.lock().await.clone())
    }
}
