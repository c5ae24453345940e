//! Resource allocation value objects
//!
//! These are plain owned data. Cloning any of them yields an independent
//! deep copy, which is what the allocation store hands out on every read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{Quantity, WorkloadId};

/// Resource names tracked by the allocation ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceName {
    /// CPU, in (fractional) cores
    Cpu,
    /// Memory, in bytes
    Memory,
}

impl ResourceName {
    /// All tracked resources
    pub const ALL: [Self; 2] = [Self::Cpu, Self::Memory];

    /// Name as used in resource lists
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping from resource name to quantity. A missing key means
/// "unspecified", which is distinct from an explicit zero.
pub type ResourceList = BTreeMap<ResourceName, Quantity>;

/// Requests and limits for one scope (a workload or a container)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Requested (guaranteed) amounts
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: ResourceList,

    /// Upper bounds
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: ResourceList,
}

impl ResourceSpec {
    /// Create an empty spec
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a request
    #[must_use]
    pub fn with_request(mut self, name: ResourceName, quantity: Quantity) -> Self {
        self.requests.insert(name, quantity);
        self
    }

    /// Set a limit
    #[must_use]
    pub fn with_limit(mut self, name: ResourceName, quantity: Quantity) -> Self {
        self.limits.insert(name, quantity);
        self
    }

    /// Whether neither requests nor limits are specified
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.limits.is_empty()
    }

    /// Request for `name`, if specified
    #[must_use]
    pub fn request(&self, name: ResourceName) -> Option<&Quantity> {
        self.requests.get(&name)
    }

    /// Limit for `name`, if specified
    #[must_use]
    pub fn limit(&self, name: ResourceName) -> Option<&Quantity> {
        self.limits.get(&name)
    }

    /// Whether a request or a limit is given for `name`
    #[must_use]
    pub fn specifies(&self, name: ResourceName) -> bool {
        self.requests.contains_key(&name) || self.limits.contains_key(&name)
    }
}

/// Allocation for one workload: the aggregate (pod-level) spec plus one
/// spec per container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    /// Pod-level requests and limits
    #[serde(default)]
    pub aggregate: ResourceSpec,

    /// Per-container specs keyed by container name
    #[serde(default)]
    pub containers: BTreeMap<String, ResourceSpec>,
}

impl AllocationRecord {
    /// Create an empty record
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the aggregate spec
    #[must_use]
    pub fn with_aggregate(mut self, spec: ResourceSpec) -> Self {
        self.aggregate = spec;
        self
    }

    /// Add or replace a container spec
    #[must_use]
    pub fn with_container(mut self, name: impl Into<String>, spec: ResourceSpec) -> Self {
        self.containers.insert(name.into(), spec);
        self
    }

    /// A record with no containers and an empty aggregate carries no
    /// allocation and must not be kept in a table
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.aggregate.is_empty()
    }
}

/// The whole allocation ledger
pub type AllocationTable = BTreeMap<WorkloadId, AllocationRecord>;
