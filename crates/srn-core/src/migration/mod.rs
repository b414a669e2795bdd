//! Migration domain module.
//!
//! Domain types for moving workspace-addressed data into scopes. The
//! execution loop itself lives in the application layer.
//!
//! # Module Structure
//!
//! - `kind`: `StorageKind` and throughput constants
//! - `plan`: `Inventory` and `MigrationPlan`
//! - `job`: `MigrationJob` state machine, `Checkpoint`, `JobError`
//! - `adapter`: the `StorageAdapter` contract
//! - `memory`: in-memory adapter
//! - `repository`: `MigrationJobRepository` and its in-memory implementation
//! - `lease`: exclusive per-job leases

pub mod adapter;
pub mod job;
pub mod kind;
pub mod lease;
pub mod memory;
pub mod plan;
pub mod repository;

pub use adapter::{LegacyItem, LegacyPage, Provenance, StorageAdapter, StoredItem};
pub use job::{
    Checkpoint, CheckpointEntry, DEFAULT_BATCH_SIZE, ExecutionOptions, JobError, JobStatus,
    JobStatusReport, MigrationJob,
};
pub use kind::{StorageKind, Throughput};
pub use lease::{InMemoryLeaseProvider, JobLease, JobLeaseProvider};
pub use memory::{MemoryAdapter, MemorySnapshot};
pub use plan::{Inventory, LARGE_DATASET_THRESHOLD, MigrationPlan};
pub use repository::{InMemoryJobRepository, MigrationJobRepository};
