//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Workload resource allocation ledger and cgroup encoder", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the cgroup values each workload in a checkpoint requires
    Encode {
        /// Allocation checkpoint file
        checkpoint: PathBuf,

        /// Only this workload
        #[arg(short, long)]
        workload: Option<String>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the QoS class of each workload in a checkpoint
    Qos {
        /// Allocation checkpoint file
        checkpoint: PathBuf,
    },

    /// Show how a CPU quantity converts to shares, weight and quota
    Weight {
        /// CPU quantity, e.g. 100m or 1.5
        cpu: String,
    },

    /// Write (or verify) the cgroup values of a checkpoint under a root
    Apply {
        /// Allocation checkpoint file
        checkpoint: PathBuf,

        /// Directory holding the workload cgroups
        #[arg(long, default_value = "/sys/fs/cgroup/tally")]
        root: PathBuf,

        /// Report drift without writing
        #[arg(long)]
        verify: bool,
    },

    /// Show version information
    Version,
}
