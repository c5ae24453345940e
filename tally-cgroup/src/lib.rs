//! Allocation to cgroup v2 encoding
//!
//! Pure conversions from allocation records to controller values
//! ([`encode_record`], [`qos_class`]), plus the collaborator contracts that
//! apply them ([`PathResolver`], [`CgroupWriter`], [`LiveWorkloads`]) and a
//! [`Reconciler`] driving them.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backend;
pub mod config;
pub mod convert;
pub mod encoder;
pub mod live;
pub mod paths;
pub mod qos;
pub mod reconcile;

pub use backend::{CgroupWriter, FsWriter, MockWriter};
pub use config::ReconcilerConfig;
pub use encoder::{
    CPU_MAX_FILE, CPU_WEIGHT_FILE, CgroupValues, CpuMax, EncodedWorkload, MEMORY_MAX_FILE,
    encode_container, encode_record, encode_scope,
};
pub use live::{LiveSet, LiveWorkloads};
pub use paths::{PathResolver, SlicePathResolver};
pub use qos::{QosClass, qos_class};
pub use reconcile::{ReconcileReport, Reconciler};

// Re-export commonly used types
pub use tally_core::{AllocationRecord, ResourceSpec};
