use crate::cli::Commands;
use anyhow::{Context, Result};
use std::path::Path;
use tally_state::CheckpointState;

pub mod apply;
pub mod encode;
pub mod qos;
pub mod weight;

/// Dispatch command to appropriate handler
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Encode {
            checkpoint,
            workload,
            json,
        } => encode::execute(&checkpoint, workload.as_deref(), json),

        Commands::Qos { checkpoint } => qos::execute(&checkpoint),

        Commands::Weight { cpu } => weight::execute(&cpu),

        Commands::Apply {
            checkpoint,
            root,
            verify,
        } => apply::execute(&checkpoint, root, verify).await,

        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Open a checkpoint that must already exist
fn open_checkpoint(path: &Path) -> Result<CheckpointState> {
    if !path.exists() {
        anyhow::bail!("Checkpoint not found: {}", path.display());
    }

    CheckpointState::open(path)
        .with_context(|| format!("Failed to load checkpoint {}", path.display()))
}

fn print_version() {
    println!("tally {}", env!("CARGO_PKG_VERSION"));
    println!("cgroup v2: cpu.weight, cpu.max, memory.max");
}
