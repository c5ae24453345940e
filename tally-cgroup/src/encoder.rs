//! Allocation to cgroup v2 controller values
//!
//! Turns an [`AllocationRecord`] into the exact strings the kernel must
//! show in `cpu.weight`, `cpu.max` and `memory.max` for the workload scope
//! and for each container scope.
//!
//! Requests never inherit. Limits do: a container that omits a CPU or
//! memory limit is bounded by the aggregate's limit for that resource, if
//! the aggregate sets one. An absent limit everywhere leaves the scope
//! unconstrained and nothing is asserted for it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use tally_core::{AllocationRecord, Error, Quantity, ResourceName, ResourceSpec, Result};

use crate::convert::{QUOTA_PERIOD, milli_cpu_to_quota, milli_cpu_to_shares, shares_to_weight};

/// Proportional CPU share file
pub const CPU_WEIGHT_FILE: &str = "cpu.weight";

/// CPU bandwidth file
pub const CPU_MAX_FILE: &str = "cpu.max";

/// Memory ceiling file
pub const MEMORY_MAX_FILE: &str = "memory.max";

/// `cpu.max` content: quota and period are always written together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuMax {
    /// Run time allowed per period, in microseconds
    pub quota: i64,
    /// Period, in microseconds
    pub period: i64,
}

impl fmt::Display for CpuMax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.quota, self.period)
    }
}

/// Controller values for one scope; `None` means nothing is asserted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CgroupValues {
    /// Legacy v1 shares the weight was derived from
    pub cpu_shares: Option<u64>,
    /// `cpu.weight`
    pub cpu_weight: Option<u64>,
    /// `cpu.max`
    pub cpu_max: Option<CpuMax>,
    /// `memory.max`, in bytes
    pub memory_max: Option<i64>,
}

impl CgroupValues {
    /// Asserted values paired with their controller file names
    #[must_use]
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = Vec::with_capacity(3);
        if let Some(weight) = self.cpu_weight {
            entries.push((CPU_WEIGHT_FILE, weight.to_string()));
        }
        if let Some(cpu_max) = self.cpu_max {
            entries.push((CPU_MAX_FILE, cpu_max.to_string()));
        }
        if let Some(bytes) = self.memory_max {
            entries.push((MEMORY_MAX_FILE, bytes.to_string()));
        }
        entries
    }

    /// Whether nothing is asserted for this scope
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cpu_weight.is_none() && self.cpu_max.is_none() && self.memory_max.is_none()
    }
}

/// Controller values for a workload and each of its containers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedWorkload {
    /// Workload (pod) scope
    pub aggregate: CgroupValues,
    /// Container scopes keyed by container name
    pub containers: BTreeMap<String, CgroupValues>,
}

/// Encode a single scope from its own spec, without inheritance
///
/// # Errors
/// Returns [`Error::InvalidQuantity`] for a negative quantity or a zero limit
pub fn encode_scope(spec: &ResourceSpec) -> Result<CgroupValues> {
    encode(spec, None)
}

/// Encode a container scope, inheriting absent limits from `aggregate`
///
/// # Errors
/// Returns [`Error::InvalidQuantity`] for a negative quantity or a zero limit
pub fn encode_container(aggregate: &ResourceSpec, container: &ResourceSpec) -> Result<CgroupValues> {
    encode(container, Some(aggregate))
}

/// Encode every scope of a record
///
/// A record without containers yields only the aggregate values.
///
/// # Errors
/// Returns the first invalid quantity found in any scope
pub fn encode_record(record: &AllocationRecord) -> Result<EncodedWorkload> {
    let aggregate = encode_scope(&record.aggregate)?;
    let mut containers = BTreeMap::new();
    for (name, spec) in &record.containers {
        containers.insert(name.clone(), encode_container(&record.aggregate, spec)?);
    }

    Ok(EncodedWorkload {
        aggregate,
        containers,
    })
}

fn encode(spec: &ResourceSpec, fallback: Option<&ResourceSpec>) -> Result<CgroupValues> {
    validate(spec)?;
    if let Some(aggregate) = fallback {
        validate(aggregate)?;
    }

    let inherited_limit = |name: ResourceName| {
        spec.limit(name)
            .or_else(|| fallback.and_then(|aggregate| aggregate.limit(name)))
    };

    let cpu_shares = spec
        .request(ResourceName::Cpu)
        .map(|q| q.milli_value().map(milli_cpu_to_shares))
        .transpose()?;

    let cpu_max = inherited_limit(ResourceName::Cpu)
        .map(|q| {
            q.milli_value().map(|millis| CpuMax {
                quota: milli_cpu_to_quota(millis, QUOTA_PERIOD),
                period: QUOTA_PERIOD,
            })
        })
        .transpose()?;

    let memory_max = inherited_limit(ResourceName::Memory)
        .map(Quantity::value)
        .transpose()?;

    Ok(CgroupValues {
        cpu_shares,
        cpu_weight: cpu_shares.map(shares_to_weight),
        cpu_max,
        memory_max,
    })
}

fn validate(spec: &ResourceSpec) -> Result<()> {
    for (name, quantity) in spec.requests.iter().chain(&spec.limits) {
        if quantity.is_negative() {
            return Err(Error::quantity(
                quantity.as_str(),
                format!("{name} must not be negative"),
            ));
        }
    }

    for (name, quantity) in &spec.limits {
        if quantity.is_zero() {
            return Err(Error::quantity(
                quantity.as_str(),
                format!("{name} limit must be greater than zero"),
            ));
        }
    }

    Ok(())
}
