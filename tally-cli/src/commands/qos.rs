//! QoS command implementation

use anyhow::Result;
use std::path::Path;
use tally_cgroup::qos_class;
use tally_state::AllocationReader;

pub fn execute(checkpoint: &Path) -> Result<()> {
    let state = super::open_checkpoint(checkpoint)?;

    for (id, record) in state.snapshot() {
        println!("{id:<40} {}", qos_class(&record));
    }

    Ok(())
}
