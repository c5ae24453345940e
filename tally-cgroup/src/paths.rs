//! Mapping workloads and containers to cgroup directories

use std::path::{Component, Path, PathBuf};
use tally_core::{Error, Result, WorkloadId};

/// Default cgroup v2 mount point
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Default slice under [`CGROUP_ROOT`] that holds workload cgroups
pub const TALLY_SLICE: &str = "tally";

/// Resolves the directory holding a scope's controller files
///
/// Workload IDs and container names come from allocation data, so a
/// resolver must never return a directory outside its root.
pub trait PathResolver: Send + Sync {
    /// Directory of the workload (aggregate) scope
    ///
    /// # Errors
    /// Returns error if the workload ID cannot name a single directory
    fn workload_dir(&self, workload: &WorkloadId) -> Result<PathBuf>;

    /// Directory of a container scope
    ///
    /// # Errors
    /// Returns error if the workload ID or container name cannot name a
    /// single directory
    fn container_dir(&self, workload: &WorkloadId, container: &str) -> Result<PathBuf>;
}

/// Check that `name` is exactly one normal path component
///
/// # Errors
/// Returns [`Error::InvalidConfig`] for empty names, `.`, `..`, absolute
/// paths and anything containing a separator
pub fn validate_segment(kind: &str, name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );

    if !single || name.contains(['/', '\\', '\0']) {
        return Err(Error::InvalidConfig {
            message: format!("{kind} {name:?} is not a valid cgroup directory name"),
        });
    }
    Ok(())
}

/// Lays scopes out as `<root>/pod<uid>/<container>`
///
/// Dashes in the workload ID become underscores, matching how systemd
/// escapes unit names.
#[derive(Debug, Clone)]
pub struct SlicePathResolver {
    root: PathBuf,
}

impl SlicePathResolver {
    /// Resolver rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for SlicePathResolver {
    fn default() -> Self {
        Self::new(Path::new(CGROUP_ROOT).join(TALLY_SLICE))
    }
}

impl PathResolver for SlicePathResolver {
    fn workload_dir(&self, workload: &WorkloadId) -> Result<PathBuf> {
        validate_segment("workload", workload.as_str())?;
        Ok(self
            .root
            .join(format!("pod{}", workload.as_str().replace('-', "_"))))
    }

    fn container_dir(&self, workload: &WorkloadId, container: &str) -> Result<PathBuf> {
        validate_segment("container", container)?;
        Ok(self.workload_dir(workload)?.join(container))
    }
}
