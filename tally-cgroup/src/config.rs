//! Reconciler configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tally_core::{Error, Result};

use crate::paths::{CGROUP_ROOT, TALLY_SLICE};

/// Reconciler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Seconds between passes
    pub interval_secs: u64,

    /// Directory holding the workload cgroups
    pub cgroup_root: PathBuf,

    /// Report drift instead of rewriting files
    pub verify_only: bool,

    /// Sweep allocations of workloads that are no longer live
    pub reclaim_orphans: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            cgroup_root: PathBuf::from(CGROUP_ROOT).join(TALLY_SLICE),
            verify_only: false,
            reclaim_orphans: true,
        }
    }
}

impl ReconcilerConfig {
    /// Create a new configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pass interval
    #[must_use]
    pub const fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = secs;
        self
    }

    /// Set the cgroup root
    #[must_use]
    pub fn with_cgroup_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cgroup_root = root.into();
        self
    }

    /// Only verify, never write
    #[must_use]
    pub const fn with_verify_only(mut self, verify_only: bool) -> Self {
        self.verify_only = verify_only;
        self
    }

    /// Enable or disable the orphan sweep
    #[must_use]
    pub const fn with_reclaim_orphans(mut self, reclaim: bool) -> Self {
        self.reclaim_orphans = reclaim;
        self
    }

    /// Check the configuration is usable
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] for a zero interval or an empty root
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(Error::InvalidConfig {
                message: "interval_secs must be greater than zero".to_string(),
            });
        }

        if self.cgroup_root.as_os_str().is_empty() {
            return Err(Error::InvalidConfig {
                message: "cgroup_root cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}
