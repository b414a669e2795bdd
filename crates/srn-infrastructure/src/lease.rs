//! Cross-process job leases backed by advisory file locks.
//!
//! A lease is an exclusive `fs2` lock on `<leases_dir>/<job_id>.lock`. The
//! operating system releases it when the holder exits, so a crashed run
//! never leaves a stale lease behind.

use srn_core::addressing::validate_item_key;
use srn_core::error::{Result, ScopeError};
use srn_core::migration::{JobLease, JobLeaseProvider};
use std::path::PathBuf;

use crate::storage::FileLock;

/// Lease provider shared by every process using the same working directory.
#[derive(Debug, Clone)]
pub struct FileLeaseProvider {
    lock_dir: PathBuf,
}

impl FileLeaseProvider {
    pub fn new(lock_dir: PathBuf) -> Self {
        Self { lock_dir }
    }
}

impl JobLeaseProvider for FileLeaseProvider {
    fn try_acquire(&self, job_id: &str) -> Result<JobLease> {
        validate_item_key(job_id)?;
        let path = self.lock_dir.join(job_id);

        match FileLock::try_acquire(&path)? {
            Some(lock) => {
                tracing::debug!(job_id, lock = %lock.lock_path().display(), "Lease acquired");
                Ok(JobLease::new(job_id, Box::new(lock)))
            }
            None => Err(ScopeError::LeaseUnavailable {
                job_id: job_id.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srn_core::ErrorKind;

    #[test]
    fn test_file_lease_is_exclusive() {
        let temp_dir = tempfile::tempdir().unwrap();
        let provider = FileLeaseProvider::new(temp_dir.path().join("leases"));
        let other = FileLeaseProvider::new(temp_dir.path().join("leases"));

        let lease = provider.try_acquire("job-1").unwrap();
        assert_eq!(lease.job_id(), "job-1");

        let err = other.try_acquire("job-1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LeaseUnavailable);
        assert!(other.try_acquire("job-2").is_ok());

        drop(lease);
        assert!(other.try_acquire("job-1").is_ok());
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let temp_dir = tempfile::tempdir().unwrap();
        let provider = FileLeaseProvider::new(temp_dir.path().to_path_buf());
        assert!(provider.try_acquire("../job").is_err());
    }
}
