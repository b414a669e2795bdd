//! Migration job state machine and progress records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::kind::StorageKind;
use super::plan::MigrationPlan;
use crate::error::{ErrorKind, Result, ScopeError};

/// Default number of items per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Lifecycle state of a migration job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    /// Accepted for execution, nothing written yet.
    Pending,
    /// An execution loop owns the job.
    Running,
    /// Every item migrated.
    Completed,
    /// At least one item failed, or the run was cancelled. Resumable.
    Failed,
    /// Migrated targets were removed.
    RolledBack,
}

impl JobStatus {
    /// Returns true if moving from `self` to `next` is a legal transition.
    ///
    /// `Running -> Running` covers re-entering a job whose previous owner
    /// crashed before recording an outcome. Rollback is accepted from any
    /// state but `RolledBack` itself.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Failed, Running)
                | (Pending, RolledBack)
                | (Running, RolledBack)
                | (Failed, RolledBack)
                | (Completed, RolledBack)
        )
    }

    /// States execution can never leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::RolledBack)
    }
}

/// One failed item or job-level failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_kind: Option<StorageKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_address: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl JobError {
    /// Error for a single item.
    pub fn item(
        kind: StorageKind,
        legacy_key: impl Into<String>,
        target_address: Option<String>,
        error: &ScopeError,
    ) -> Self {
        Self {
            legacy_key: Some(legacy_key.into()),
            storage_kind: Some(kind),
            target_address,
            kind: error.kind(),
            message: error.to_string(),
            occurred_at: Utc::now(),
        }
    }

    /// Error affecting a whole storage kind (e.g. listing failed).
    pub fn storage_kind(kind: StorageKind, error: &ScopeError) -> Self {
        Self {
            legacy_key: None,
            storage_kind: Some(kind),
            target_address: None,
            kind: error.kind(),
            message: error.to_string(),
            occurred_at: Utc::now(),
        }
    }

    /// Error affecting the whole job (e.g. cancellation).
    pub fn job(error: &ScopeError) -> Self {
        Self {
            legacy_key: None,
            storage_kind: None,
            target_address: None,
            kind: error.kind(),
            message: error.to_string(),
            occurred_at: Utc::now(),
        }
    }
}

/// Progress for one storage kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    /// Listing position to restart from. Stops advancing once a batch in this
    /// kind had a failed item, so resume revisits the failed items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_token: Option<String>,
    /// Most recent legacy key written to its target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_migrated: Option<String>,
    /// Every legacy key written by this job.
    #[serde(default)]
    pub migrated: BTreeSet<String>,
    /// Listing reached the end with no outstanding failures.
    #[serde(default)]
    pub complete: bool,
}

/// Per-kind checkpoints of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint {
    entries: BTreeMap<StorageKind, CheckpointEntry>,
}

impl Checkpoint {
    pub fn entry(&self, kind: StorageKind) -> Option<&CheckpointEntry> {
        self.entries.get(&kind)
    }

    pub fn entry_mut(&mut self, kind: StorageKind) -> &mut CheckpointEntry {
        self.entries.entry(kind).or_default()
    }

    pub fn entries(&self) -> impl Iterator<Item = (StorageKind, &CheckpointEntry)> {
        self.entries.iter().map(|(kind, entry)| (*kind, entry))
    }

    pub fn is_migrated(&self, kind: StorageKind, legacy_key: &str) -> bool {
        self.entries
            .get(&kind)
            .is_some_and(|entry| entry.migrated.contains(legacy_key))
    }

    /// Records a successful write.
    pub fn mark_migrated(&mut self, kind: StorageKind, legacy_key: &str) {
        let entry = self.entry_mut(kind);
        entry.migrated.insert(legacy_key.to_string());
        entry.last_migrated = Some(legacy_key.to_string());
    }

    pub fn migrated_count(&self) -> u64 {
        self.entries
            .values()
            .map(|entry| entry.migrated.len() as u64)
            .sum()
    }
}

/// Persisted migration state machine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationJob {
    pub id: String,
    pub plan: MigrationPlan,
    pub status: JobStatus,
    pub processed_count: u64,
    pub errors: Vec<JobError>,
    pub checkpoint: Checkpoint,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Number of times an execution loop entered `Running`.
    pub attempts: u32,
    /// Preview produced by a dry run; never persisted.
    #[serde(default)]
    pub dry_run: bool,
}

impl MigrationJob {
    /// Creates a pending job for a plan.
    pub fn new(plan: MigrationPlan) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            plan,
            status: JobStatus::Pending,
            processed_count: 0,
            errors: Vec::new(),
            checkpoint: Checkpoint::default(),
            created_at: now,
            updated_at: now,
            attempts: 0,
            dry_run: false,
        }
    }

    /// Moves the job to `next`.
    ///
    /// # Errors
    ///
    /// Returns `MigrationValidation` for an illegal transition.
    pub fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(ScopeError::validation(format!(
                "job '{}' cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        if next == JobStatus::Running {
            self.attempts += 1;
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Appends an error. A newer failure of the same item replaces the older
    /// entry so each item appears at most once.
    pub fn record_error(&mut self, error: JobError) {
        if let (Some(kind), Some(key)) = (error.storage_kind, error.legacy_key.as_deref()) {
            self.errors.retain(|existing| {
                existing.storage_kind != Some(kind) || existing.legacy_key.as_deref() != Some(key)
            });
        }
        self.errors.push(error);
        self.touch();
    }

    /// Records a successful item write: checkpoint, progress, and removal of
    /// an earlier failure of the same item. Already migrated keys are not
    /// counted twice.
    pub fn record_migrated(&mut self, kind: StorageKind, legacy_key: &str) {
        if self.checkpoint.is_migrated(kind, legacy_key) {
            return;
        }
        self.checkpoint.mark_migrated(kind, legacy_key);
        self.processed_count += 1;
        self.errors.retain(|existing| {
            existing.storage_kind != Some(kind) || existing.legacy_key.as_deref() != Some(legacy_key)
        });
        self.touch();
    }

    /// Drops item errors for keys that have since been migrated, and
    /// job-level errors from earlier attempts.
    pub fn clear_resolved_errors(&mut self) {
        let checkpoint = &self.checkpoint;
        self.errors.retain(|error| match (error.storage_kind, &error.legacy_key) {
            (Some(kind), Some(key)) => !checkpoint.is_migrated(kind, key),
            _ => false,
        });
    }

    /// Drops item errors of `kind` for keys after `listed_after` that a
    /// complete listing no longer returned. The source item is gone, so
    /// nothing is left to retry. Returns the number of errors dropped.
    pub fn drop_vanished_errors(
        &mut self,
        kind: StorageKind,
        listed_after: Option<&str>,
        listed: &BTreeSet<String>,
    ) -> usize {
        let before = self.errors.len();
        let checkpoint = &self.checkpoint;
        self.errors.retain(|error| {
            let Some(key) = error.legacy_key.as_deref() else {
                return true;
            };
            let vanished = error.storage_kind == Some(kind)
                && listed_after.is_none_or(|after| key > after)
                && !listed.contains(key)
                && !checkpoint.is_migrated(kind, key);
            !vanished
        });
        let dropped = before - self.errors.len();
        if dropped > 0 {
            self.touch();
        }
        dropped
    }

    pub fn total_items(&self) -> u64 {
        self.plan.estimated_total()
    }

    /// Share of planned items processed, 0-100.
    pub fn progress_percent(&self) -> f64 {
        let total = self.total_items();
        if total == 0 {
            return if self.status == JobStatus::Completed { 100.0 } else { 0.0 };
        }
        (self.processed_count as f64 / total as f64 * 100.0).min(100.0)
    }

    pub fn status_report(&self) -> JobStatusReport {
        JobStatusReport {
            job_id: self.id.clone(),
            status: self.status,
            processed_count: self.processed_count,
            total_items: self.total_items(),
            progress_percent: self.progress_percent(),
            errors: self.errors.clone(),
        }
    }
}

/// Status polling view of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub job_id: String,
    pub status: JobStatus,
    pub processed_count: u64,
    pub total_items: u64,
    pub progress_percent: f64,
    pub errors: Vec<JobError>,
}

/// Options for one execution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    pub dry_run: bool,
    pub batch_size: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ExecutionOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ScopeError::validation("batch size must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::kind::Throughput;
    use crate::migration::plan::Inventory;
    use crate::scope::{Scope, ScopeResolver};

    fn job() -> MigrationJob {
        let ws = "abc12345abcd12345abc1234567890ab";
        let mut inventory = Inventory::new(ws);
        inventory.record(StorageKind::KvStore, 4);
        let target = Scope::from_string(&format!("1.{}.user.john", ws)).unwrap();
        let plan = MigrationPlan::build(
            &inventory,
            &target,
            &ScopeResolver::default(),
            &Throughput::default(),
        )
        .unwrap();
        MigrationJob::new(plan)
    }

    #[test]
    fn test_state_machine() {
        let mut job = job();
        assert!(job.transition(JobStatus::Completed).is_err());
        job.transition(JobStatus::Running).unwrap();
        job.transition(JobStatus::Failed).unwrap();
        job.transition(JobStatus::Running).unwrap();
        assert_eq!(job.attempts, 2);
        job.transition(JobStatus::Completed).unwrap();
        assert!(job.status.is_terminal());
        assert!(job.transition(JobStatus::Running).is_err());
        job.transition(JobStatus::RolledBack).unwrap();
        assert!(job.transition(JobStatus::RolledBack).is_err());
    }

    #[test]
    fn test_progress_and_checkpoint() {
        let mut job = job();
        job.checkpoint.mark_migrated(StorageKind::KvStore, "a");
        job.checkpoint.mark_migrated(StorageKind::KvStore, "a");
        job.processed_count = 1;
        assert_eq!(job.checkpoint.migrated_count(), 1);
        assert_eq!(job.progress_percent(), 25.0);
        assert_eq!(
            job.checkpoint
                .entry(StorageKind::KvStore)
                .unwrap()
                .last_migrated
                .as_deref(),
            Some("a")
        );
    }

    #[test]
    fn test_clear_resolved_errors() {
        let mut job = job();
        let failure = ScopeError::storage("disk");
        job.record_error(JobError::item(StorageKind::KvStore, "a", None, &failure));
        job.record_error(JobError::item(StorageKind::KvStore, "b", None, &failure));
        job.record_error(JobError::job(&ScopeError::Cancelled("stop".into())));
        job.record_error(JobError::item(StorageKind::KvStore, "b", None, &failure));
        assert_eq!(job.errors.len(), 3);
        job.checkpoint.mark_migrated(StorageKind::KvStore, "a");

        job.clear_resolved_errors();
        assert_eq!(job.errors.len(), 1);
        assert_eq!(job.errors[0].legacy_key.as_deref(), Some("b"));
    }

    #[test]
    fn test_drop_vanished_errors() {
        let mut job = job();
        let failure = ScopeError::storage("disk");
        for key in ["a", "b", "c"] {
            job.record_error(JobError::item(StorageKind::KvStore, key, None, &failure));
        }
        job.record_error(JobError::item(StorageKind::VectorStore, "b", None, &failure));
        job.record_error(JobError::storage_kind(StorageKind::KvStore, &failure));

        let listed: BTreeSet<String> = ["c".to_string()].into_iter().collect();
        let dropped = job.drop_vanished_errors(StorageKind::KvStore, Some("a"), &listed);

        assert_eq!(dropped, 1);
        let remaining: Vec<(Option<StorageKind>, Option<&str>)> = job
            .errors
            .iter()
            .map(|error| (error.storage_kind, error.legacy_key.as_deref()))
            .collect();
        assert_eq!(
            remaining,
            vec![
                (Some(StorageKind::KvStore), Some("a")),
                (Some(StorageKind::KvStore), Some("c")),
                (Some(StorageKind::VectorStore), Some("b")),
                (Some(StorageKind::KvStore), None),
            ]
        );
    }

    #[test]
    fn test_record_migrated_counts_once() {
        let mut job = job();
        let failure = ScopeError::storage("disk");
        job.record_error(JobError::item(StorageKind::KvStore, "a", None, &failure));

        job.record_migrated(StorageKind::KvStore, "a");
        job.record_migrated(StorageKind::KvStore, "a");
        assert_eq!(job.processed_count, 1);
        assert!(job.errors.is_empty());
        assert!(job.checkpoint.is_migrated(StorageKind::KvStore, "a"));
    }

    #[test]
    fn test_options_validate() {
        assert!(ExecutionOptions::default().validate().is_ok());
        assert!(ExecutionOptions::default().with_batch_size(0).validate().is_err());
        assert!(ExecutionOptions::dry_run().dry_run);
    }
}
