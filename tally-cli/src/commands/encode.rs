//! Encode command implementation

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tally_cgroup::{CgroupValues, encode_record};
use tally_core::WorkloadId;
use tally_state::AllocationReader;

pub fn execute(checkpoint: &Path, workload: Option<&str>, json: bool) -> Result<()> {
    let state = super::open_checkpoint(checkpoint)?;
    let mut table = state.snapshot();

    if let Some(id) = workload {
        let id = WorkloadId::new(id).context("Invalid workload ID")?;
        let record = table
            .remove(&id)
            .with_context(|| format!("Workload {id} not in checkpoint"))?;
        table = BTreeMap::from([(id, record)]);
    }

    tracing::info!(workloads = table.len(), "Encoding allocations");

    let mut encoded = BTreeMap::new();
    for (id, record) in &table {
        let values =
            encode_record(record).with_context(|| format!("Failed to encode workload {id}"))?;
        encoded.insert(id.clone(), values);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&encoded)?);
        return Ok(());
    }

    for (id, values) in &encoded {
        println!("{id}");
        print_scope("(pod)", &values.aggregate);
        for (container, scope) in &values.containers {
            print_scope(container, scope);
        }
    }

    Ok(())
}

fn print_scope(name: &str, values: &CgroupValues) {
    let entries = values.entries();
    if entries.is_empty() {
        println!("  {name:<16} unconstrained");
        return;
    }

    for (file, value) in entries {
        println!("  {name:<16} {file:<12} {value}");
    }
}
