//! Tally Core - shared allocation vocabulary
//!
//! Workload identities, resource quantities, allocation records and the
//! error and event types used by the store and the cgroup encoder.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod events;
pub mod quantity;
pub mod resources;
pub mod types;

pub use error::{Error, Result};
pub use events::AllocationEvent;
pub use quantity::Quantity;
pub use resources::{AllocationRecord, AllocationTable, ResourceList, ResourceName, ResourceSpec};
pub use types::WorkloadId;
