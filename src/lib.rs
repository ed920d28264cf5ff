//! `runsort` is an external, distributed merge sort for flat files of
//! variable-length binary records keyed by a `u64`.
//!
//! The pipeline is bulk-synchronous across a message-passing world and
//! parallel within each process:
//! - The coordinator walks the input once to find record boundaries, then
//!   hands every rank a record-aligned byte slice (full-table broadcast for
//!   moderate inputs, per-rank scatter beyond a record-count threshold).
//! - Each rank memory-maps the input, sorts an index of `{key, payload}`
//!   views over its slice on a local thread pool, and writes a sorted run.
//! - Runs are reduced to one globally sorted file by a logarithmic-depth
//!   tree merge; losing ranks stream their run to a partner and idle at the
//!   round barriers until termination.
//!
//! Inputs may exceed aggregate memory: payloads are never held in the sort,
//! only referenced through the mapping, and merging is streaming. Equal keys
//! carry no ordering guarantee.

pub mod engine;
pub mod fabric;
pub mod merge;
pub mod plan;
pub mod record;
pub mod scan;
pub mod scratch;
pub mod sorter;

pub use engine::{Affinity, SortEngine, SortOptions};
pub use fabric::{Fabric, FabricError};
