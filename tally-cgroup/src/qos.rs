//! Quality-of-service classification
//!
//! Derived from a record on demand; never stored.

use serde::{Deserialize, Serialize};
use std::fmt;

use tally_core::{AllocationRecord, ResourceName, ResourceSpec};

/// How tightly a workload's requests match its limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QosClass {
    /// Request equals limit for CPU and memory in every scope
    Guaranteed,
    /// Something is specified, but not enough for `Guaranteed`
    Burstable,
    /// Nothing is specified anywhere
    BestEffort,
}

impl fmt::Display for QosClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Guaranteed => "Guaranteed",
            Self::Burstable => "Burstable",
            Self::BestEffort => "BestEffort",
        };
        f.write_str(s)
    }
}

/// Classify a workload
///
/// A container that says nothing about a resource is covered by a
/// non-empty aggregate for that resource; any container that does specify
/// it must pin request to limit itself.
#[must_use]
pub fn qos_class(record: &AllocationRecord) -> QosClass {
    let anything_specified =
        !record.aggregate.is_empty() || record.containers.values().any(|spec| !spec.is_empty());

    if !anything_specified {
        QosClass::BestEffort
    } else if is_guaranteed(record) {
        QosClass::Guaranteed
    } else {
        QosClass::Burstable
    }
}

// Stricter than kubelet with pod-level resources: there a pinned pod stays
// Guaranteed whatever its containers say, so a container at 50m/100m under
// a pod pinned at 100m is Guaranteed in kubelet but Burstable here. Every
// scope that states a resource must pin it.
fn is_guaranteed(record: &AllocationRecord) -> bool {
    let has_aggregate = !record.aggregate.is_empty();

    if has_aggregate {
        if !pinned_all(&record.aggregate) {
            return false;
        }
    } else if record.containers.is_empty() {
        return false;
    }

    record.containers.values().all(|spec| {
        ResourceName::ALL
            .iter()
            .all(|&name| (has_aggregate && !spec.specifies(name)) || pinned(spec, name))
    })
}

fn pinned_all(spec: &ResourceSpec) -> bool {
    ResourceName::ALL.iter().all(|&name| pinned(spec, name))
}

fn pinned(spec: &ResourceSpec, name: ResourceName) -> bool {
    matches!((spec.request(name), spec.limit(name)), (Some(request), Some(limit)) if request == limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::Quantity;

    fn q(s: &str) -> Quantity {
        Quantity::parse(s).unwrap()
    }

    fn spec(cpu: (&str, &str), mem: (&str, &str)) -> ResourceSpec {
        let mut spec = ResourceSpec::new();
        for (name, (req, lim)) in [(ResourceName::Cpu, cpu), (ResourceName::Memory, mem)] {
            if !req.is_empty() {
                spec = spec.with_request(name, q(req));
            }
            if !lim.is_empty() {
                spec = spec.with_limit(name, q(lim));
            }
        }
        spec
    }

    #[test]
    fn guaranteed_aggregate_without_container_overrides() {
        let record = AllocationRecord::new()
            .with_aggregate(spec(("100m", "100m"), ("100Mi", "100Mi")))
            .with_container("c1", ResourceSpec::new())
            .with_container("c2", ResourceSpec::new());
        assert_eq!(qos_class(&record), QosClass::Guaranteed);
    }

    #[test]
    fn burstable_aggregate() {
        let record = AllocationRecord::new()
            .with_aggregate(spec(("50m", "100m"), ("50Mi", "100Mi")))
            .with_container("c1", ResourceSpec::new());
        assert_eq!(qos_class(&record), QosClass::Burstable);
    }

    #[test]
    fn container_breaks_guarantee() {
        let record = AllocationRecord::new()
            .with_aggregate(spec(("100m", "100m"), ("100Mi", "100Mi")))
            .with_container("c1", spec(("50m", "100m"), ("", "")));
        assert_eq!(qos_class(&record), QosClass::Burstable);

        // Pinned pod, unpinned containers: Guaranteed in kubelet, not here
        let record = AllocationRecord::new()
            .with_aggregate(spec(("100m", "100m"), ("100Mi", "100Mi")))
            .with_container("c1", spec(("50m", "100m"), ("50Mi", "100Mi")))
            .with_container("c2", spec(("50m", "100m"), ("50Mi", "100Mi")));
        assert_eq!(qos_class(&record), QosClass::Burstable);
    }

    #[test]
    fn equal_values_in_different_units() {
        let record = AllocationRecord::new().with_container("c1", spec(("1", "1000m"), ("1Gi", "1073741824")));
        assert_eq!(qos_class(&record), QosClass::Guaranteed);
    }

    #[test]
    fn containers_only_need_both_resources() {
        let record = AllocationRecord::new().with_container("c1", spec(("1", "1"), ("", "")));
        assert_eq!(qos_class(&record), QosClass::Burstable);
    }

    #[test]
    fn aggregate_missing_a_resource() {
        let record = AllocationRecord::new().with_aggregate(spec(("1", "1"), ("", "")));
        assert_eq!(qos_class(&record), QosClass::Burstable);
    }

    #[test]
    fn best_effort() {
        assert_eq!(qos_class(&AllocationRecord::new()), QosClass::BestEffort);
        let record = AllocationRecord::new()
            .with_container("c1", ResourceSpec::new())
            .with_container("c2", ResourceSpec::new());
        assert_eq!(qos_class(&record), QosClass::BestEffort);
    }

    #[test]
    fn limit_only_is_burstable() {
        let record = AllocationRecord::new().with_container("c1", spec(("", "1"), ("", "1Gi")));
        assert_eq!(qos_class(&record), QosClass::Burstable);
    }
}
