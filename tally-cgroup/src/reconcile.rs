//! Periodic reconciliation of allocations against cgroup files
//!
//! Each pass sweeps orphaned allocations, snapshots the store, encodes every
//! record and brings each asserted controller file in line with it.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tally_core::{AllocationEvent, Result, WorkloadId};
use tally_state::AllocationState;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Duration, interval};

use crate::backend::CgroupWriter;
use crate::config::ReconcilerConfig;
use crate::encoder::{CgroupValues, EncodedWorkload, encode_record};
use crate::live::LiveWorkloads;
use crate::paths::{PathResolver, SlicePathResolver};

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Workloads in the snapshot
    pub workloads: usize,
    /// Workloads dropped by the orphan sweep
    pub reclaimed: Vec<WorkloadId>,
    /// Files rewritten
    pub written: usize,
    /// Files already correct
    pub unchanged: usize,
    /// Files found wrong in verify-only mode
    pub drifted: usize,
    /// Workloads that could not be encoded or applied, with the reason
    pub failed: Vec<(WorkloadId, String)>,
}

#[derive(Clone)]
struct Shared {
    state: Arc<dyn AllocationState>,
    resolver: Arc<dyn PathResolver>,
    writer: Arc<dyn CgroupWriter>,
    live: Arc<dyn LiveWorkloads>,
    config: ReconcilerConfig,
    event_tx: Option<mpsc::Sender<AllocationEvent>>,
}

/// Reconciler that runs in the background
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use tally_cgroup::{FsWriter, LiveSet, Reconciler, ReconcilerConfig};
/// use tally_state::MemoryState;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let reconciler = Reconciler::new(
///     Arc::new(MemoryState::default()),
///     Arc::new(FsWriter),
///     Arc::new(LiveSet::new()),
///     ReconcilerConfig::default(),
/// );
///
/// let handle = reconciler.start().await.unwrap();
/// // ...
/// reconciler.stop().await;
/// handle.await.unwrap();
/// # });
/// ```
pub struct Reconciler {
    shared: Shared,
    running: Arc<Mutex<bool>>,
}

impl Reconciler {
    /// Create a reconciler laying cgroups out under `config.cgroup_root`
    #[must_use]
    pub fn new(
        state: Arc<dyn AllocationState>,
        writer: Arc<dyn CgroupWriter>,
        live: Arc<dyn LiveWorkloads>,
        config: ReconcilerConfig,
    ) -> Self {
        let resolver = Arc::new(SlicePathResolver::new(config.cgroup_root.clone()));
        Self {
            shared: Shared {
                state,
                resolver,
                writer,
                live,
                config,
                event_tx: None,
            },
            running: Arc::new(Mutex::new(false)),
        }
    }

    /// Use a different path layout
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn PathResolver>) -> Self {
        self.shared.resolver = resolver;
        self
    }

    /// Add event channel for emitting events
    #[must_use]
    pub fn with_events(mut self, tx: mpsc::Sender<AllocationEvent>) -> Self {
        self.shared.event_tx = Some(tx);
        self
    }

    /// Run a single pass
    ///
    /// Per-workload failures are collected in the report; only a failure of
    /// the live-workload source or the store aborts the pass.
    ///
    /// # Errors
    /// Returns error if the live set cannot be fetched or the sweep fails
    pub async fn reconcile_once(&self) -> Result<ReconcileReport> {
        self.shared.reconcile_once().await
    }

    /// Start passes in the background
    ///
    /// # Errors
    /// Returns error if the configuration is invalid
    pub async fn start(&self) -> Result<tokio::task::JoinHandle<()>> {
        self.shared.config.validate()?;
        *self.running.lock().await = true;

        let shared = self.shared.clone();
        let running = Arc::clone(&self.running);
        let interval_secs = self.shared.config.interval_secs;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(interval_secs));

            tracing::info!(
                interval_secs,
                verify_only = shared.config.verify_only,
                "Allocation reconciler started"
            );

            loop {
                ticker.tick().await;

                if !*running.lock().await {
                    tracing::debug!("Reconciler stopping");
                    break;
                }

                match shared.reconcile_once().await {
                    Ok(report) => tracing::debug!(
                        workloads = report.workloads,
                        written = report.written,
                        failed = report.failed.len(),
                        "Reconcile pass finished"
                    ),
                    Err(e) => tracing::error!(error = %e, "Reconcile pass aborted"),
                }
            }

            tracing::info!("Allocation reconciler stopped");
        });

        Ok(handle)
    }

    /// Stop after the current pass
    pub async fn stop(&self) {
        *self.running.lock().await = false;
        tracing::debug!("Stopping reconciler");
    }
}

impl Shared {
    async fn reconcile_once(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        if self.config.reclaim_orphans {
            let live = self.live.live_workloads().await?;
            report.reclaimed = self.state.reclaim_orphans(&live)?;
            for workload in &report.reclaimed {
                self.emit(AllocationEvent::Reclaimed {
                    workload: workload.clone(),
                    timestamp: SystemTime::now(),
                })
                .await;
            }
        }

        let snapshot = self.state.snapshot();
        report.workloads = snapshot.len();

        for (workload, record) in &snapshot {
            let outcome = match encode_record(record) {
                Ok(encoded) => self.apply_workload(workload, &encoded, &mut report).await,
                Err(e) => Err(e),
            };

            if let Err(e) = outcome {
                report.failed.push((workload.clone(), e.to_string()));
                self.emit(AllocationEvent::Error {
                    workload: workload.clone(),
                    message: e.to_string(),
                    timestamp: SystemTime::now(),
                })
                .await;
            }
        }

        tracing::info!(
            workloads = report.workloads,
            reclaimed = report.reclaimed.len(),
            written = report.written,
            unchanged = report.unchanged,
            drifted = report.drifted,
            failed = report.failed.len(),
            "Reconciled allocations"
        );
        Ok(report)
    }

    async fn apply_workload(
        &self,
        workload: &WorkloadId,
        encoded: &EncodedWorkload,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        // Resolve every scope first so a bad name leaves the workload untouched.
        let workload_dir = self.resolver.workload_dir(workload)?;
        let mut containers = Vec::with_capacity(encoded.containers.len());
        for (container, values) in &encoded.containers {
            let dir = self.resolver.container_dir(workload, container)?;
            containers.push((container, dir, values));
        }

        self.apply_scope(workload, None, &workload_dir, &encoded.aggregate, report)
            .await?;

        for (container, dir, values) in containers {
            self.apply_scope(workload, Some(container), &dir, values, report)
                .await?;
        }
        Ok(())
    }

    async fn apply_scope(
        &self,
        workload: &WorkloadId,
        container: Option<&str>,
        dir: &Path,
        values: &CgroupValues,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        for (file, expected) in values.entries() {
            let actual = self.writer.read_value(dir, file).await?;
            if actual.as_deref() == Some(expected.as_str()) {
                report.unchanged += 1;
                continue;
            }

            if self.config.verify_only {
                report.drifted += 1;
                self.emit(AllocationEvent::Drift {
                    workload: workload.clone(),
                    container: container.map(str::to_string),
                    file: file.to_string(),
                    expected,
                    actual,
                    timestamp: SystemTime::now(),
                })
                .await;
                continue;
            }

            self.writer.write_value(dir, file, &expected).await?;
            report.written += 1;
            self.emit(AllocationEvent::Applied {
                workload: workload.clone(),
                container: container.map(str::to_string),
                file: file.to_string(),
                value: expected,
                previous: actual,
                timestamp: SystemTime::now(),
            })
            .await;
        }
        Ok(())
    }

    async fn emit(&self, event: AllocationEvent) {
        event.emit_trace();
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}
