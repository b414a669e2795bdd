//! Migration job repository trait.
//!
//! Defines the interface for durable `MigrationJob` storage. The job record
//! is the only structure that must survive process restarts.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::job::MigrationJob;
use crate::error::Result;

/// An abstract repository for migration job records.
///
/// # Implementation Notes
///
/// Implementations should handle:
/// - Record versioning and migrations
/// - Atomic replacement so a crash never leaves a torn record
#[async_trait]
pub trait MigrationJobRepository: Send + Sync {
    /// Finds a job by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(MigrationJob))`: Job found
    /// - `Ok(None)`: Job not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn find_by_id(&self, job_id: &str) -> Result<Option<MigrationJob>>;

    /// Saves (creates or replaces) a job.
    async fn save(&self, job: &MigrationJob) -> Result<()>;

    /// Deletes a job. Deleting a missing job is not an error.
    async fn delete(&self, job_id: &str) -> Result<()>;

    /// Lists all stored jobs ordered by creation time.
    async fn list_all(&self) -> Result<Vec<MigrationJob>>;
}

/// Repository keeping jobs in process memory.
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<BTreeMap<String, MigrationJob>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MigrationJobRepository for InMemoryJobRepository {
    async fn find_by_id(&self, job_id: &str) -> Result<Option<MigrationJob>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn save(&self, job: &MigrationJob) -> Result<()> {
        self.jobs
            .write()
            .await
            .insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn delete(&self, job_id: &str) -> Result<()> {
        self.jobs.write().await.remove(job_id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<MigrationJob>> {
        let mut jobs: Vec<MigrationJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }
}
