//! Exclusive per-job execution leases.
//!
//! Only the holder of a job's lease may mutate it. A second `execute`,
//! `resume` or `rollback` against the same job id fails with
//! `LeaseUnavailable` until the first one drops its lease.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::{Result, ScopeError};

/// Held lease. Released on drop.
pub struct JobLease {
    job_id: String,
    _guard: Box<dyn Send + Sync>,
}

impl JobLease {
    /// Wraps a provider-specific guard whose drop releases the lease.
    pub fn new(job_id: impl Into<String>, guard: Box<dyn Send + Sync>) -> Self {
        Self {
            job_id: job_id.into(),
            _guard: guard,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl std::fmt::Debug for JobLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobLease")
            .field("job_id", &self.job_id)
            .finish()
    }
}

/// Source of exclusive job leases.
pub trait JobLeaseProvider: Send + Sync {
    /// Acquires the lease without waiting.
    ///
    /// # Errors
    ///
    /// Returns `LeaseUnavailable` if another holder owns the lease.
    fn try_acquire(&self, job_id: &str) -> Result<JobLease>;
}

/// Process-local lease provider.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLeaseProvider {
    held: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryLeaseProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, job_id: &str) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(job_id))
            .unwrap_or(false)
    }
}

struct InMemoryGuard {
    job_id: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InMemoryGuard {
    fn drop(&mut self) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(&self.job_id);
        }
    }
}

impl JobLeaseProvider for InMemoryLeaseProvider {
    fn try_acquire(&self, job_id: &str) -> Result<JobLease> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| ScopeError::storage("lease table lock poisoned"))?;
        if !held.insert(job_id.to_string()) {
            return Err(ScopeError::LeaseUnavailable {
                job_id: job_id.to_string(),
            });
        }
        drop(held);

        Ok(JobLease::new(
            job_id,
            Box::new(InMemoryGuard {
                job_id: job_id.to_string(),
                held: Arc::clone(&self.held),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_lease_is_exclusive_until_dropped() {
        let provider = InMemoryLeaseProvider::new();
        let lease = provider.try_acquire("job-1").unwrap();
        assert_eq!(lease.job_id(), "job-1");
        assert!(provider.is_held("job-1"));

        let err = provider.try_acquire("job-1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LeaseUnavailable);
        assert!(provider.try_acquire("job-2").is_ok());

        drop(lease);
        assert!(!provider.is_held("job-1"));
        assert!(provider.try_acquire("job-1").is_ok());
    }
}
