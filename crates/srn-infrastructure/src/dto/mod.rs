//! Data Transfer Objects (DTOs) for persistence.
//!
//! These DTOs represent the versioned schema for persisting data.
//! They are private to the infrastructure layer and handle the evolution
//! of the storage format over time.
//!
//! ## Schema Versioning (Semantic Versioning)
//!
//! - **MAJOR (X.0.0)**: Breaking changes (field removal, type changes)
//! - **MINOR (1.X.0)**: Backward-compatible additions (new optional fields)
//!
//! ### MigrationJob Version History
//! - **1.0.0**: Initial schema (plan, status, progress, errors, checkpoint)
//! - **1.1.0**: Added `created_at`, `updated_at` and `attempts`

mod migration_job;

pub use migration_job::{
    JobStatusDTO, MigrationJobDTO, MigrationJobV1_0, MigrationJobV1_1, MigrationPlanDTO,
    create_migration_job_migrator,
};
