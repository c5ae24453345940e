//! Allocation reconciliation events with structured tracing

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

use crate::WorkloadId;

/// Events emitted while reconciling allocations against cgroups
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AllocationEvent {
    /// Workload entry dropped by the orphan sweep
    Reclaimed {
        /// Workload ID
        workload: WorkloadId,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// A controller file was (re)written
    Applied {
        /// Workload ID
        workload: WorkloadId,
        /// Container name, `None` for the aggregate scope
        container: Option<String>,
        /// Controller file, e.g. `cpu.max`
        file: String,
        /// Value written
        value: String,
        /// Value found before the write
        previous: Option<String>,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// A controller file differs from the allocation (verify-only mode)
    Drift {
        /// Workload ID
        workload: WorkloadId,
        /// Container name, `None` for the aggregate scope
        container: Option<String>,
        /// Controller file
        file: String,
        /// Value the allocation requires
        expected: String,
        /// Value found
        actual: Option<String>,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// Allocation could not be encoded or applied
    Error {
        /// Workload ID
        workload: WorkloadId,
        /// Error message
        message: String,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },
}

impl AllocationEvent {
    /// Get the workload ID from any event
    #[must_use]
    pub const fn workload(&self) -> &WorkloadId {
        match self {
            Self::Reclaimed { workload, .. }
            | Self::Applied { workload, .. }
            | Self::Drift { workload, .. }
            | Self::Error { workload, .. } => workload,
        }
    }

    /// Get the timestamp from any event
    #[must_use]
    pub const fn timestamp(&self) -> SystemTime {
        match self {
            Self::Reclaimed { timestamp, .. }
            | Self::Applied { timestamp, .. }
            | Self::Drift { timestamp, .. }
            | Self::Error { timestamp, .. } => *timestamp,
        }
    }

    /// Check if this is a critical event
    #[must_use]
    pub const fn is_critical(&self) -> bool {
        matches!(self, Self::Drift { .. } | Self::Error { .. })
    }

    /// Emit structured tracing event
    pub fn emit_trace(&self) {
        match self {
            Self::Reclaimed { workload, .. } => {
                tracing::info!(
                    workload = %workload,
                    event = "reclaimed",
                    "Orphaned allocation reclaimed"
                );
            }
            Self::Applied {
                workload,
                container,
                file,
                value,
                previous,
                ..
            } => {
                tracing::debug!(
                    workload = %workload,
                    container = container.as_deref().unwrap_or("-"),
                    file = %file,
                    value = %value,
                    previous = previous.as_deref().unwrap_or("-"),
                    event = "applied",
                    "Cgroup value applied"
                );
            }
            Self::Drift {
                workload,
                container,
                file,
                expected,
                actual,
                ..
            } => {
                tracing::warn!(
                    workload = %workload,
                    container = container.as_deref().unwrap_or("-"),
                    file = %file,
                    expected = %expected,
                    actual = actual.as_deref().unwrap_or("-"),
                    event = "drift",
                    "Cgroup value drifted from allocation"
                );
            }
            Self::Error {
                workload, message, ..
            } => {
                tracing::error!(
                    workload = %workload,
                    message = %message,
                    event = "error",
                    "Allocation error"
                );
            }
        }
    }
}

impl fmt::Display for AllocationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reclaimed { workload, .. } => write!(f, "Workload {workload} reclaimed"),
            Self::Applied {
                workload,
                container,
                file,
                value,
                ..
            } => match container {
                Some(c) => write!(f, "Workload {workload}/{c} {file} = {value}"),
                None => write!(f, "Workload {workload} {file} = {value}"),
            },
            Self::Drift {
                workload,
                container,
                file,
                expected,
                ..
            } => match container {
                Some(c) => write!(f, "Workload {workload}/{c} {file} drifted (want {expected})"),
                None => write!(f, "Workload {workload} {file} drifted (want {expected})"),
            },
            Self::Error {
                workload, message, ..
            } => write!(f, "Workload {workload} error: {message}"),
        }
    }
}

mod systemtime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_u64(since_epoch.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + std::time::Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_workload() {
        let id = WorkloadId::new("pod-a").unwrap();
        let event = AllocationEvent::Reclaimed {
            workload: id.clone(),
            timestamp: SystemTime::now(),
        };

        assert_eq!(event.workload(), &id);
        assert!(!event.is_critical());
    }

    #[test]
    fn test_event_display() {
        let event = AllocationEvent::Applied {
            workload: WorkloadId::new("pod-a").unwrap(),
            container: Some("c1".to_string()),
            file: "cpu.max".to_string(),
            value: "10000 100000".to_string(),
            previous: None,
            timestamp: SystemTime::now(),
        };

        assert_eq!(event.to_string(), "Workload pod-a/c1 cpu.max = 10000 100000");
    }

    #[test]
    fn test_event_serde() {
        let event = AllocationEvent::Drift {
            workload: WorkloadId::new("pod-a").unwrap(),
            container: None,
            file: "memory.max".to_string(),
            expected: "104857600".to_string(),
            actual: Some("max".to_string()),
            timestamp: SystemTime::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"drift\""));
        let deserialized: AllocationEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event.workload(), deserialized.workload());
        assert!(deserialized.is_critical());
    }
}
