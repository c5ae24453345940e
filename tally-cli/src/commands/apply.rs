//! Apply command implementation

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tally_cgroup::{FsWriter, LiveSet, Reconciler, ReconcilerConfig};

pub async fn execute(checkpoint: &Path, root: PathBuf, verify: bool) -> Result<()> {
    let state = super::open_checkpoint(checkpoint)?;

    // The checkpoint is the whole truth here, so there is nothing to sweep.
    let config = ReconcilerConfig::new()
        .with_cgroup_root(root)
        .with_verify_only(verify)
        .with_reclaim_orphans(false);
    config.validate()?;

    let reconciler = Reconciler::new(
        Arc::new(state),
        Arc::new(FsWriter),
        Arc::new(LiveSet::new()),
        config,
    );

    let report = reconciler
        .reconcile_once()
        .await
        .context("Reconcile pass failed")?;

    println!(
        "workloads: {}  written: {}  unchanged: {}  drifted: {}  failed: {}",
        report.workloads,
        report.written,
        report.unchanged,
        report.drifted,
        report.failed.len()
    );
    for (id, reason) in &report.failed {
        println!("  {id}: {reason}");
    }

    if !report.failed.is_empty() || (verify && report.drifted > 0) {
        anyhow::bail!("cgroup values do not match the checkpoint");
    }

    Ok(())
}
