//! TOML-based migration job repository implementation.
//!
//! Stores each job as an individual `<job_id>.toml` file in the jobs
//! directory. The record is rewritten after every committed batch, so it is
//! the durable checkpoint a crashed migration resumes from.

use async_trait::async_trait;
use srn_core::addressing::validate_item_key;
use srn_core::error::{Result, ScopeError};
use srn_core::migration::{MigrationJob, MigrationJobRepository};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::task;

use crate::dto::create_migration_job_migrator;
use crate::storage::write_atomic;

const ENTITY: &str = "migration_job";

/// TOML-based migration job repository.
///
/// # Features
///
/// - **Atomic writes**: Uses tmp file + fsync + atomic rename pattern
/// - **Version migration**: Handles schema evolution via version-migrate
/// - **Async-safe**: All operations wrapped in tokio::task::spawn_blocking
pub struct TomlMigrationJobRepository {
    /// Directory holding one file per job (typically `<working_dir>/.srn/jobs`)
    jobs_dir: PathBuf,
}

impl TomlMigrationJobRepository {
    pub fn new(jobs_dir: PathBuf) -> Self {
        Self { jobs_dir }
    }

    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    /// Path of a job record. The id doubles as a file name, so it must be a
    /// single safe path segment.
    fn job_path(&self, job_id: &str) -> Result<PathBuf> {
        validate_item_key(job_id)?;
        Ok(self.jobs_dir.join(format!("{}.toml", job_id)))
    }

    /// Loads a job from a TOML file synchronously.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(MigrationJob))`: Job loaded successfully
    /// - `Ok(None)`: File does not exist
    /// - `Err`: Error reading, parsing or migrating the file
    fn load_job_sync(path: &Path) -> Result<Option<MigrationJob>> {
        if !path.exists() {
            return Ok(None);
        }

        let toml_str = fs::read_to_string(path).map_err(|e| {
            ScopeError::io(format!(
                "Failed to read job file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let toml_value: toml::Value = toml::from_str(&toml_str).map_err(|e| {
            ScopeError::serialization(
                "TOML",
                format!("Failed to parse job TOML from '{}': {}", path.display(), e),
            )
        })?;

        let migrator = create_migration_job_migrator();
        let job: MigrationJob = migrator.load_flat_from(ENTITY, toml_value).map_err(|e| {
            ScopeError::serialization(
                "TOML",
                format!("Failed to migrate job from '{}': {}", path.display(), e),
            )
        })?;

        Ok(Some(job))
    }

    /// Saves a job to a TOML file synchronously with atomic writes.
    fn save_job_sync(path: &Path, job: &MigrationJob) -> Result<()> {
        // Serialize to JSON first (migrator works with JSON)
        let migrator = create_migration_job_migrator();
        let json_str = migrator.save_domain_flat(ENTITY, job).map_err(|e| {
            ScopeError::serialization("JSON", format!("Failed to serialize job: {}", e))
        })?;

        let json_value: serde_json::Value = serde_json::from_str(&json_str)?;
        let toml_value = json_to_toml(&json_value)?;
        let toml_str = toml::to_string_pretty(&toml_value)?;

        write_atomic(path, toml_str.as_bytes())
    }

    /// Deletes a job file synchronously. A missing file is not an error.
    fn delete_job_sync(path: &Path) -> Result<()> {
        if path.exists() {
            fs::remove_file(path).map_err(|e| {
                ScopeError::io(format!(
                    "Failed to delete job file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Lists all `*.toml` job files synchronously.
    fn list_job_files_sync(jobs_dir: &Path) -> Result<Vec<PathBuf>> {
        if !jobs_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(jobs_dir).map_err(|e| {
            ScopeError::io(format!(
                "Failed to read jobs directory '{}': {}",
                jobs_dir.display(),
                e
            ))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_record = path.is_file()
                && path.extension().is_some_and(|ext| ext == "toml")
                && !path
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with('.'));
            if is_record {
                files.push(path);
            }
        }

        Ok(files)
    }
}

#[async_trait]
impl MigrationJobRepository for TomlMigrationJobRepository {
    async fn find_by_id(&self, job_id: &str) -> Result<Option<MigrationJob>> {
        let path = self.job_path(job_id)?;

        task::spawn_blocking(move || Self::load_job_sync(&path))
            .await
            .map_err(|e| ScopeError::io(format!("Failed to spawn blocking task: {}", e)))?
    }

    async fn save(&self, job: &MigrationJob) -> Result<()> {
        if job.dry_run {
            return Err(ScopeError::validation(format!(
                "job '{}' is a dry-run preview and cannot be persisted",
                job.id
            )));
        }
        let path = self.job_path(&job.id)?;
        let job = job.clone();

        task::spawn_blocking(move || Self::save_job_sync(&path, &job))
            .await
            .map_err(|e| ScopeError::io(format!("Failed to spawn blocking task: {}", e)))?
    }

    async fn delete(&self, job_id: &str) -> Result<()> {
        let path = self.job_path(job_id)?;

        task::spawn_blocking(move || Self::delete_job_sync(&path))
            .await
            .map_err(|e| ScopeError::io(format!("Failed to spawn blocking task: {}", e)))?
    }

    async fn list_all(&self) -> Result<Vec<MigrationJob>> {
        let jobs_dir = self.jobs_dir.clone();

        task::spawn_blocking(move || {
            let mut jobs = Vec::new();
            for path in Self::list_job_files_sync(&jobs_dir)? {
                match Self::load_job_sync(&path) {
                    Ok(Some(job)) => jobs.push(job),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable job record");
                    }
                }
            }

            jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            Ok(jobs)
        })
        .await
        .map_err(|e| ScopeError::io(format!("Failed to spawn blocking task: {}", e)))?
    }
}

/// Converts a serde_json::Value to a toml::Value.
///
/// This is needed because version-migrate uses JSON internally. TOML has no
/// null, so null object members are dropped; every optional field of the job
/// record deserializes a missing key as `None`.
fn json_to_toml(json: &serde_json::Value) -> Result<toml::Value> {
    match json {
        serde_json::Value::Null => Err(ScopeError::serialization(
            "TOML",
            "null values cannot be represented in TOML",
        )),
        serde_json::Value::Bool(b) => Ok(toml::Value::Boolean(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(toml::Value::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(toml::Value::Float(f))
            } else {
                Err(ScopeError::serialization(
                    "TOML",
                    format!("Unsupported JSON number: {}", n),
                ))
            }
        }
        serde_json::Value::String(s) => Ok(toml::Value::String(s.clone())),
        serde_json::Value::Array(arr) => {
            let toml_arr: Result<Vec<toml::Value>> = arr.iter().map(json_to_toml).collect();
            Ok(toml::Value::Array(toml_arr?))
        }
        serde_json::Value::Object(obj) => {
            let mut toml_map = toml::map::Map::new();
            for (k, v) in obj {
                if v.is_null() {
                    continue;
                }
                toml_map.insert(k.clone(), json_to_toml(v)?);
            }
            Ok(toml::Value::Table(toml_map))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srn_core::migration::{
        Inventory, JobError, JobStatus, MigrationPlan, StorageKind, Throughput,
    };
    use srn_core::scope::{Scope, ScopeResolver};

    const WS: &str = "abc12345abcd12345abc1234567890ab";

    fn job() -> MigrationJob {
        let mut inventory = Inventory::new(WS);
        inventory.record(StorageKind::KvStore, 3);
        inventory.record(StorageKind::GraphStore, 2);
        let target = Scope::from_string(&format!("1.{}.user.john.proj_research", WS)).unwrap();
        let plan = MigrationPlan::build(
            &inventory,
            &target,
            &ScopeResolver::default(),
            &Throughput::default(),
        )
        .unwrap();
        MigrationJob::new(plan)
    }

    #[tokio::test]
    async fn test_save_and_find_job() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = TomlMigrationJobRepository::new(temp_dir.path().join("jobs"));

        let mut job = job();
        job.transition(JobStatus::Running).unwrap();
        job.checkpoint.mark_migrated(StorageKind::KvStore, "a");
        job.checkpoint.entry_mut(StorageKind::KvStore).resume_token = Some("a".to_string());
        job.processed_count = 1;
        job.record_error(JobError::item(
            StorageKind::GraphStore,
            "node-1",
            None,
            &ScopeError::storage("disk full"),
        ));
        repo.save(&job).await.unwrap();

        let found = repo.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(found, job);
        assert!(!temp_dir
            .path()
            .join("jobs")
            .join(format!(".{}.toml.tmp", job.id))
            .exists());
    }

    #[tokio::test]
    async fn test_find_missing_and_delete() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = TomlMigrationJobRepository::new(temp_dir.path().to_path_buf());

        assert!(repo.find_by_id("missing").await.unwrap().is_none());
        repo.delete("missing").await.unwrap();

        let job = job();
        repo.save(&job).await.unwrap();
        repo.delete(&job.id).await.unwrap();
        assert!(repo.find_by_id(&job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_unsafe_ids_and_dry_runs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = TomlMigrationJobRepository::new(temp_dir.path().to_path_buf());

        assert!(repo.find_by_id("../escape").await.is_err());

        let mut preview = job();
        preview.dry_run = true;
        assert!(repo.save(&preview).await.is_err());
        assert!(repo.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_all_ordered_by_creation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = TomlMigrationJobRepository::new(temp_dir.path().to_path_buf());

        let first = job();
        let mut second = job();
        second.created_at = first.created_at + chrono::Duration::seconds(5);
        repo.save(&second).await.unwrap();
        repo.save(&first).await.unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let ids: Vec<String> = repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|job| job.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[test]
    fn test_json_to_toml_drops_nulls() {
        let json = serde_json::json!({ "a": 1, "b": null, "c": [true, 1.5] });
        let toml_value = json_to_toml(&json).unwrap();
        let table = toml_value.as_table().unwrap();
        assert!(table.get("b").is_none());
        assert_eq!(table.get("a"), Some(&toml::Value::Integer(1)));
    }
}
