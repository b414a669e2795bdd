//! MigrationJob DTOs and migrations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use version_migrate::{FromDomain, IntoDomain, MigratesTo, Versioned};

use srn_core::migration::{Checkpoint, JobError, JobStatus, MigrationJob, MigrationPlan, StorageKind};
use srn_core::scope::Scope;

/// Job status DTO matching domain model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatusDTO {
    Pending,
    Running,
    Completed,
    Failed,
    RolledBack,
}

impl From<JobStatusDTO> for JobStatus {
    fn from(dto: JobStatusDTO) -> Self {
        match dto {
            JobStatusDTO::Pending => JobStatus::Pending,
            JobStatusDTO::Running => JobStatus::Running,
            JobStatusDTO::Completed => JobStatus::Completed,
            JobStatusDTO::Failed => JobStatus::Failed,
            JobStatusDTO::RolledBack => JobStatus::RolledBack,
        }
    }
}

impl From<JobStatus> for JobStatusDTO {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Pending => JobStatusDTO::Pending,
            JobStatus::Running => JobStatusDTO::Running,
            JobStatus::Completed => JobStatusDTO::Completed,
            JobStatus::Failed => JobStatusDTO::Failed,
            JobStatus::RolledBack => JobStatusDTO::RolledBack,
        }
    }
}

/// Migration plan DTO embedded in every job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlanDTO {
    pub source_workspace: String,
    pub target: Scope,
    #[serde(default)]
    pub estimated_items: BTreeMap<StorageKind, u64>,
    #[serde(default)]
    pub storage_kinds: Vec<StorageKind>,
    #[serde(default)]
    pub estimated_duration_ms: u64,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl From<MigrationPlanDTO> for MigrationPlan {
    fn from(dto: MigrationPlanDTO) -> Self {
        MigrationPlan {
            source_workspace: dto.source_workspace,
            target: dto.target,
            estimated_items: dto.estimated_items,
            storage_kinds: dto.storage_kinds,
            estimated_duration_ms: dto.estimated_duration_ms,
            warnings: dto.warnings,
        }
    }
}

impl From<MigrationPlan> for MigrationPlanDTO {
    fn from(plan: MigrationPlan) -> Self {
        MigrationPlanDTO {
            source_workspace: plan.source_workspace,
            target: plan.target,
            estimated_items: plan.estimated_items,
            storage_kinds: plan.storage_kinds,
            estimated_duration_ms: plan.estimated_duration_ms,
            warnings: plan.warnings,
        }
    }
}

/// MigrationJob V1.0.0 (initial version).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Versioned)]
#[versioned(version = "1.0.0")]
pub struct MigrationJobV1_0 {
    pub id: String,
    pub plan: MigrationPlanDTO,
    pub status: JobStatusDTO,
    #[serde(default)]
    pub processed_count: u64,
    #[serde(default)]
    pub errors: Vec<JobError>,
    #[serde(default)]
    pub checkpoint: Checkpoint,
}

/// MigrationJob V1.1.0: adds timestamps and the attempt counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Versioned)]
#[versioned(version = "1.1.0")]
pub struct MigrationJobV1_1 {
    pub id: String,
    pub plan: MigrationPlanDTO,
    pub status: JobStatusDTO,
    #[serde(default)]
    pub processed_count: u64,
    #[serde(default)]
    pub errors: Vec<JobError>,
    #[serde(default)]
    pub checkpoint: Checkpoint,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
}

/// Type alias for the latest MigrationJob version.
pub type MigrationJobDTO = MigrationJobV1_1;

// ============================================================================
// Migration implementations
// ============================================================================

/// Migration from V1.0 to V1.1.
///
/// V1.0 records carry no timestamps; the migration time stands in for both.
/// A job that ever left `pending` ran at least once.
impl MigratesTo<MigrationJobV1_1> for MigrationJobV1_0 {
    fn migrate(self) -> MigrationJobV1_1 {
        let now = Utc::now();
        let attempts = if self.status == JobStatusDTO::Pending { 0 } else { 1 };

        MigrationJobV1_1 {
            id: self.id,
            plan: self.plan,
            status: self.status,
            processed_count: self.processed_count,
            errors: self.errors,
            checkpoint: self.checkpoint,
            created_at: now,
            updated_at: now,
            attempts,
        }
    }
}

// ============================================================================
// Domain model conversions
// ============================================================================

impl IntoDomain<MigrationJob> for MigrationJobV1_1 {
    fn into_domain(self) -> MigrationJob {
        MigrationJob {
            id: self.id,
            plan: self.plan.into(),
            status: self.status.into(),
            processed_count: self.processed_count,
            errors: self.errors,
            checkpoint: self.checkpoint,
            created_at: self.created_at,
            updated_at: self.updated_at,
            attempts: self.attempts,
            dry_run: false,
        }
    }
}

impl FromDomain<MigrationJob> for MigrationJobV1_1 {
    fn from_domain(job: MigrationJob) -> Self {
        MigrationJobV1_1 {
            id: job.id,
            plan: job.plan.into(),
            status: job.status.into(),
            processed_count: job.processed_count,
            errors: job.errors,
            checkpoint: job.checkpoint,
            created_at: job.created_at,
            updated_at: job.updated_at,
            attempts: job.attempts,
        }
    }
}

// ============================================================================
// Migrator factory
// ============================================================================

/// Creates and configures a Migrator instance for MigrationJob entities.
///
/// # Migration Path
///
/// - V1.0 → V1.1: Adds `created_at`, `updated_at`, `attempts`
/// - V1.1 → MigrationJob: Converts DTO to domain model
///
/// # Example
///
/// ```ignore
/// let migrator = create_migration_job_migrator();
/// let job: MigrationJob = migrator.load_flat_from("migration_job", toml_value)?;
/// ```
pub fn create_migration_job_migrator() -> version_migrate::Migrator {
    let mut migrator = version_migrate::Migrator::builder().build();

    let job_path = version_migrate::Migrator::define("migration_job")
        .from::<MigrationJobV1_0>()
        .step::<MigrationJobV1_1>()
        .into_with_save::<MigrationJob>();

    migrator
        .register(job_path)
        .expect("Failed to register migration_job migration path");

    migrator
}

#[cfg(test)]
mod tests {
    use super::*;

    const V1_0_RECORD: &str = r#"
version = "1.0.0"
id = "job-1"
status = "failed"
processed_count = 3

[plan]
source_workspace = "abc12345abcd12345abc1234567890ab"
target = "1.abc12345abcd12345abc1234567890ab.user.john.proj_research"
storage_kinds = ["kv_store"]
estimated_duration_ms = 10

[plan.estimated_items]
kv_store = 5

[checkpoint.kv_store]
resume_token = "c"
last_migrated = "c"
migrated = ["a", "b", "c"]
complete = false

[[errors]]
legacy_key = "d"
storage_kind = "kv_store"
kind = "storage"
message = "Storage error: disk full"
occurred_at = "2025-01-02T03:04:05Z"
"#;

    #[test]
    fn test_migration_job_v1_0_to_domain() {
        let migrator = create_migration_job_migrator();
        let toml_value: toml::Value = toml::from_str(V1_0_RECORD).unwrap();

        let result: Result<MigrationJob, _> = migrator.load_flat_from("migration_job", toml_value);
        assert!(result.is_ok(), "Migration failed: {:?}", result.err());

        let job = result.unwrap();
        assert_eq!(job.id, "job-1");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.processed_count, 3);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.created_at, job.updated_at);
        assert_eq!(job.plan.estimated_total(), 5);
        assert_eq!(job.plan.target.project(), Some("research"));
        assert!(job.checkpoint.is_migrated(StorageKind::KvStore, "b"));
        assert_eq!(
            job.checkpoint
                .entry(StorageKind::KvStore)
                .unwrap()
                .resume_token
                .as_deref(),
            Some("c")
        );
        assert_eq!(job.errors.len(), 1);
        assert_eq!(job.errors[0].kind, srn_core::ErrorKind::Storage);
        assert!(!job.dry_run);
    }

    #[test]
    fn test_pending_v1_0_has_no_attempts() {
        let migrator = create_migration_job_migrator();
        let record = V1_0_RECORD.replace("status = \"failed\"", "status = \"pending\"");
        let toml_value: toml::Value = toml::from_str(&record).unwrap();

        let job: MigrationJob = migrator.load_flat_from("migration_job", toml_value).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
    }

    #[test]
    fn test_migration_job_save() {
        let migrator = create_migration_job_migrator();
        let toml_value: toml::Value = toml::from_str(V1_0_RECORD).unwrap();
        let job: MigrationJob = migrator.load_flat_from("migration_job", toml_value).unwrap();

        let json_str = migrator.save_domain_flat("migration_job", &job).unwrap();
        assert!(json_str.contains("\"version\":\"1.1.0\""));
        assert!(json_str.contains("\"id\":\"job-1\""));
        assert!(json_str.contains("\"status\":\"failed\""));
        assert!(json_str.contains("\"attempts\":1"));
        assert!(!json_str.contains("dry_run"));
    }
}
