//! Allocation state store
//!
//! The authoritative ledger of CPU and memory allocated to each workload
//! and its containers. [`AllocationReader`] and [`AllocationWriter`] are the
//! contract; [`MemoryState`] and [`CheckpointState`] implement it.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod checkpoint;
pub mod memory;
pub mod state;

pub use checkpoint::CheckpointState;
pub use memory::MemoryState;
pub use state::{AllocationReader, AllocationState, AllocationWriter};
