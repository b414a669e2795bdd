//! Migration engine implementation.
//!
//! Moves workspace-addressed legacy items into a target scope across every
//! registered storage adapter.
//!
//! # Responsibilities
//!
//! - Discovery of legacy items (read-only)
//! - Planning (pure, delegated to `MigrationPlan::build`)
//! - Execution in fixed-size batches with a durable checkpoint per storage kind
//! - Resume of failed or interrupted jobs
//! - Rollback of every item a job wrote
//!
//! # Concurrency
//!
//! Storage kinds are migrated concurrently; batches within one kind run
//! sequentially so the checkpoint never runs ahead of the writes. A job is
//! mutated only while its exclusive lease is held.

use futures::future::join_all;
use srn_core::addressing::{ItemAddress, ScopeAddress};
use srn_core::error::{Result, ScopeError};
use srn_core::migration::{
    ExecutionOptions, Inventory, JobError, JobLeaseProvider, JobStatus, JobStatusReport,
    LegacyItem, MigrationJob, MigrationJobRepository, MigrationPlan, StorageAdapter, StorageKind,
    StoredItem, Throughput,
};
use srn_core::scope::{Scope, ScopeResolver};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Orchestrates discovery, planning, execution and rollback.
pub struct MigrationEngine {
    /// One adapter per storage kind
    adapters: BTreeMap<StorageKind, Arc<dyn StorageAdapter>>,
    /// Durable job records
    repository: Arc<dyn MigrationJobRepository>,
    /// Exclusive per-job leases
    leases: Arc<dyn JobLeaseProvider>,
    resolver: ScopeResolver,
    throughput: Throughput,
}

/// State shared by the per-kind loops of one run.
struct RunContext {
    job: Mutex<MigrationJob>,
    /// Orders checkpoint saves; the job lock is never held across I/O.
    save_lock: Mutex<()>,
    options: ExecutionOptions,
    cancel: CancellationToken,
    dry_run: bool,
    started: Instant,
    estimate: Duration,
    deadline_warned: AtomicBool,
}

/// What rollback found at a target address.
enum Removal {
    Removed,
    Missing,
    /// Overwritten by another writer; left in place.
    Foreign,
}

impl MigrationEngine {
    /// Creates an engine with no adapters, the default legacy resolver and
    /// default throughput constants.
    pub fn new(
        repository: Arc<dyn MigrationJobRepository>,
        leases: Arc<dyn JobLeaseProvider>,
    ) -> Self {
        Self {
            adapters: BTreeMap::new(),
            repository,
            leases,
            resolver: ScopeResolver::default(),
            throughput: Throughput::default(),
        }
    }

    /// Registers an adapter, replacing any adapter previously registered for
    /// the same storage kind.
    pub fn with_adapter(mut self, adapter: Arc<dyn StorageAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn with_adapters(self, adapters: impl IntoIterator<Item = Arc<dyn StorageAdapter>>) -> Self {
        adapters
            .into_iter()
            .fold(self, |engine, adapter| engine.with_adapter(adapter))
    }

    pub fn with_resolver(mut self, resolver: ScopeResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_throughput(mut self, throughput: Throughput) -> Self {
        self.throughput = throughput;
        self
    }

    pub fn resolver(&self) -> &ScopeResolver {
        &self.resolver
    }

    pub fn storage_kinds(&self) -> Vec<StorageKind> {
        self.adapters.keys().copied().collect()
    }

    // ============================================================================
    // Discovery and planning
    // ============================================================================

    /// Counts legacy items of `source_workspace` in every registered adapter.
    /// Never mutates anything.
    pub async fn discover(&self, source_workspace: &str) -> Result<Inventory> {
        if source_workspace.trim().is_empty() {
            return Err(ScopeError::validation("source workspace cannot be empty"));
        }

        let mut inventory = Inventory::new(source_workspace);
        for (kind, adapter) in &self.adapters {
            let count = adapter.count_legacy(source_workspace).await?;
            tracing::debug!(source_workspace, storage_kind = %kind, count, "Counted legacy items");
            inventory.record(*kind, count);
        }

        tracing::info!(
            source_workspace,
            total = inventory.total_items(),
            "Discovery finished"
        );
        Ok(inventory)
    }

    /// Legacy workspaces known to any adapter, sorted and deduplicated.
    pub async fn discover_workspaces(&self) -> Result<Vec<String>> {
        let mut workspaces = BTreeSet::new();
        for adapter in self.adapters.values() {
            workspaces.extend(adapter.legacy_workspaces().await?);
        }
        Ok(workspaces.into_iter().collect())
    }

    /// Builds a plan for an inventory. Pure.
    pub fn plan(&self, inventory: &Inventory, target: &Scope) -> Result<MigrationPlan> {
        MigrationPlan::build(inventory, target, &self.resolver, &self.throughput)
    }

    /// Discovery followed by planning.
    ///
    /// Adds a warning for every storage kind whose backend already holds
    /// data directly under the target scope.
    pub async fn plan_for(&self, source_workspace: &str, target: &Scope) -> Result<MigrationPlan> {
        let inventory = self.discover(source_workspace).await?;
        let mut plan = self.plan(&inventory, target)?;

        for (kind, adapter) in &self.adapters {
            let address = ScopeAddress::derive(target, adapter.family())?;
            if adapter.has_target_items(&address).await? {
                tracing::debug!(storage_kind = %kind, target = %address, "Target already populated");
                plan.warnings.push(format!(
                    "target scope '{}' already holds {} data",
                    target, kind
                ));
            }
        }
        Ok(plan)
    }

    // ============================================================================
    // Execution
    // ============================================================================

    /// Persists a pending job for a plan.
    pub async fn submit(&self, plan: MigrationPlan) -> Result<MigrationJob> {
        let job = MigrationJob::new(plan);
        self.repository.save(&job).await?;
        tracing::info!(
            job_id = %job.id,
            source_workspace = %job.plan.source_workspace,
            target = %job.plan.target,
            estimated_items = job.plan.estimated_total(),
            "Job submitted"
        );
        Ok(job)
    }

    /// Executes a plan.
    ///
    /// With `dry_run` every step except the final write runs; the returned
    /// job is an unpersisted preview (`dry_run == true`) listing what would
    /// be migrated and which items would conflict.
    ///
    /// Item failures never fail the call: they are recorded in the job's
    /// `errors` and the job ends in `Failed`.
    ///
    /// # Errors
    ///
    /// Returns `MigrationValidation` for invalid options, and repository or
    /// lease errors.
    pub async fn execute(
        &self,
        plan: MigrationPlan,
        options: ExecutionOptions,
        cancel: CancellationToken,
    ) -> Result<MigrationJob> {
        options.validate()?;

        if options.dry_run {
            let mut job = MigrationJob::new(plan);
            job.dry_run = true;
            let span = tracing::info_span!("migration_job", job_id = %job.id, dry_run = true);
            return self.run(job, options, cancel).instrument(span).await;
        }

        let job = self.submit(plan).await?;
        let _lease = self.leases.try_acquire(&job.id)?;
        let span = tracing::info_span!("migration_job", job_id = %job.id);
        self.run(job, options, cancel).instrument(span).await
    }

    /// Re-enters a job that is `failed`, `pending`, or `running` without a
    /// live owner (interrupted process).
    ///
    /// # Errors
    ///
    /// - `LeaseUnavailable`: another execution owns the job
    /// - `NotFound`: no such job
    /// - `MigrationValidation`: the job is terminal or `dry_run` was requested
    pub async fn resume(
        &self,
        job_id: &str,
        options: ExecutionOptions,
        cancel: CancellationToken,
    ) -> Result<MigrationJob> {
        options.validate()?;
        if options.dry_run {
            return Err(ScopeError::validation("a dry run cannot resume a job"));
        }

        let _lease = self.leases.try_acquire(job_id)?;
        let job = self.load(job_id).await?;
        if job.status.is_terminal() {
            return Err(ScopeError::validation(format!(
                "job '{}' is {} and cannot be resumed",
                job_id, job.status
            )));
        }

        let span = tracing::info_span!("migration_job", job_id = %job.id);
        self.run(job, options, cancel).instrument(span).await
    }

    async fn run(
        &self,
        mut job: MigrationJob,
        options: ExecutionOptions,
        cancel: CancellationToken,
    ) -> Result<MigrationJob> {
        let dry_run = job.dry_run;
        let previous = job.status;
        job.clear_resolved_errors();
        job.transition(JobStatus::Running)?;
        tracing::info!(
            job_id = %job.id,
            from = %previous,
            attempt = job.attempts,
            dry_run,
            "Job running"
        );
        if !dry_run {
            self.repository.save(&job).await?;
        }

        let kinds = job.plan.storage_kinds.clone();
        let ctx = RunContext {
            estimate: job.plan.estimated_duration(),
            job: Mutex::new(job),
            save_lock: Mutex::new(()),
            options,
            cancel,
            dry_run,
            started: Instant::now(),
            deadline_warned: AtomicBool::new(false),
        };

        let results = join_all(kinds.iter().map(|kind| self.migrate_kind(*kind, &ctx))).await;
        let cancelled = ctx.cancel.is_cancelled();
        let mut job = ctx.job.into_inner();

        if let Some(err) = results.into_iter().find_map(|result| result.err()) {
            tracing::error!(job_id = %job.id, error = %err, "Job aborted");
            job.record_error(JobError::job(&err));
            if !dry_run && job.transition(JobStatus::Failed).is_ok() {
                if let Err(save_err) = self.repository.save(&job).await {
                    tracing::error!(job_id = %job.id, error = %save_err, "Failed to persist aborted job");
                }
            }
            return Err(err);
        }

        let incomplete: Vec<StorageKind> = kinds
            .iter()
            .copied()
            .filter(|kind| !job.checkpoint.entry(*kind).is_some_and(|entry| entry.complete))
            .collect();

        if cancelled && !incomplete.is_empty() {
            job.record_error(JobError::job(&ScopeError::Cancelled(
                "cancellation requested between batches".to_string(),
            )));
        }
        let outcome = if incomplete.is_empty() && job.errors.is_empty() {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        job.transition(outcome)?;

        if !dry_run {
            self.repository.save(&job).await?;
        }
        tracing::info!(
            job_id = %job.id,
            status = %job.status,
            processed = job.processed_count,
            errors = job.errors.len(),
            elapsed_ms = ctx.started.elapsed().as_millis() as u64,
            dry_run,
            "Job finished"
        );
        Ok(job)
    }

    /// Runs the batch loop for one storage kind.
    ///
    /// Only repository failures are returned; everything else is recorded in
    /// the job.
    async fn migrate_kind(&self, kind: StorageKind, ctx: &RunContext) -> Result<()> {
        let (job_id, workspace, target, mut token, complete) = {
            let job = ctx.job.lock().await;
            let entry = job.checkpoint.entry(kind).cloned().unwrap_or_default();
            (
                job.id.clone(),
                job.plan.source_workspace.clone(),
                job.plan.target.clone(),
                entry.resume_token,
                entry.complete,
            )
        };
        if complete {
            tracing::debug!(job_id = %job_id, storage_kind = %kind, "Storage kind already complete");
            return Ok(());
        }

        let Some(adapter) = self.adapters.get(&kind).cloned() else {
            let err = ScopeError::execution(format!("no storage adapter registered for {}", kind));
            tracing::warn!(job_id = %job_id, storage_kind = %kind, "No adapter registered");
            ctx.job.lock().await.record_error(JobError::storage_kind(kind, &err));
            return Ok(());
        };

        let address = match ScopeAddress::derive(&target, adapter.family()) {
            Ok(address) => address,
            Err(err) => {
                ctx.job.lock().await.record_error(JobError::storage_kind(kind, &err));
                return Ok(());
            }
        };

        // Set once any item of this kind fails in this run; the resume token
        // stays put from then on so resume revisits the failure.
        let mut failed = false;
        let listed_after = token.clone();
        let mut listed = BTreeSet::new();
        loop {
            if ctx.cancel.is_cancelled() {
                tracing::info!(job_id = %job_id, storage_kind = %kind, "Cancellation observed between batches");
                return Ok(());
            }

            let page = match adapter
                .list_legacy(&workspace, token.as_deref(), ctx.options.batch_size)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    let err = ScopeError::execution(format!("listing {} failed: {}", kind, e));
                    tracing::warn!(job_id = %job_id, storage_kind = %kind, error = %e, "Legacy listing failed");
                    ctx.job.lock().await.record_error(JobError::storage_kind(kind, &err));
                    return Ok(());
                }
            };

            let mut batch_failed = false;
            for item in &page.items {
                listed.insert(item.key.clone());
                if ctx.job.lock().await.checkpoint.is_migrated(kind, &item.key) {
                    continue;
                }

                let outcome = match address.item(&item.key) {
                    Ok(target_item) => self
                        .migrate_item(adapter.as_ref(), &target_item, &job_id, item, ctx.dry_run)
                        .await
                        .map_err(|err| (err, Some(target_item.render()))),
                    Err(err) => Err((err, None)),
                };

                match outcome {
                    Ok(()) => ctx.job.lock().await.record_migrated(kind, &item.key),
                    Err((err, target_address)) => {
                        batch_failed = true;
                        tracing::warn!(
                            job_id = %job_id,
                            storage_kind = %kind,
                            legacy_key = %item.key,
                            target = target_address.as_deref().unwrap_or(""),
                            error_kind = %err.kind(),
                            "Item not migrated: {}",
                            err
                        );
                        ctx.job.lock().await.record_error(JobError::item(
                            kind,
                            &item.key,
                            target_address,
                            &err,
                        ));
                    }
                }
            }
            failed |= batch_failed;

            {
                let _save = ctx.save_lock.lock().await;
                let snapshot = {
                    let mut job = ctx.job.lock().await;
                    let entry = job.checkpoint.entry_mut(kind);
                    if !failed {
                        if let Some(last) = page.items.last() {
                            entry.resume_token = Some(last.key.clone());
                        }
                    }
                    if page.next_token.is_none() {
                        entry.complete = !failed;
                        let dropped =
                            job.drop_vanished_errors(kind, listed_after.as_deref(), &listed);
                        if dropped > 0 {
                            tracing::info!(
                                job_id = %job_id,
                                storage_kind = %kind,
                                dropped,
                                "Cleared errors of legacy items that no longer exist"
                            );
                        }
                    }
                    job.touch();
                    tracing::debug!(
                        job_id = %job_id,
                        storage_kind = %kind,
                        batch = page.items.len(),
                        processed = job.processed_count,
                        "Batch committed"
                    );
                    (!ctx.dry_run).then(|| job.clone())
                };
                if let Some(snapshot) = snapshot {
                    self.repository.save(&snapshot).await?;
                }
            }
            self.check_deadline(ctx, &job_id);

            match page.next_token {
                Some(next) => token = Some(next),
                None => return Ok(()),
            }
        }
    }

    /// Writes one legacy item to its target address.
    ///
    /// A target holding data not written by this job is a conflict. A target
    /// written by this job is overwritten with identical content, which
    /// makes re-running a partially written batch safe.
    async fn migrate_item(
        &self,
        adapter: &dyn StorageAdapter,
        target: &ItemAddress,
        job_id: &str,
        item: &LegacyItem,
        dry_run: bool,
    ) -> Result<()> {
        let existing = adapter.read(target).await.map_err(|e| {
            ScopeError::execution(format!("reading '{}' failed: {}", target, e))
        })?;
        if let Some(existing) = existing {
            if !existing.written_by(job_id) {
                return Err(ScopeError::conflict(
                    target.render(),
                    "target already holds data not written by this job",
                ));
            }
        }

        if dry_run {
            return Ok(());
        }

        adapter
            .write(target, &StoredItem::migrated(item.payload.clone(), job_id, &item.key))
            .await
            .map_err(|e| ScopeError::execution(format!("writing '{}' failed: {}", target, e)))
    }

    fn check_deadline(&self, ctx: &RunContext, job_id: &str) {
        let elapsed = ctx.started.elapsed();
        if elapsed > ctx.estimate && !ctx.deadline_warned.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                job_id = %job_id,
                elapsed_ms = elapsed.as_millis() as u64,
                estimated_ms = ctx.estimate.as_millis() as u64,
                "Migration is running past its estimated duration"
            );
        }
    }

    // ============================================================================
    // Rollback
    // ============================================================================

    /// Deletes every target item the job recorded as migrated.
    ///
    /// Source data is never touched. Items at a target that no longer carry
    /// this job's provenance are reported in `errors` and left in place.
    ///
    /// # Errors
    ///
    /// - `LeaseUnavailable`: another execution owns the job
    /// - `NotFound`: no such job
    /// - `MigrationValidation`: the job is already rolled back
    /// - `MigrationExecution`: some deletes failed; the job keeps its status
    ///   and the remaining items so rollback can be retried
    pub async fn rollback(&self, job_id: &str) -> Result<MigrationJob> {
        let _lease = self.leases.try_acquire(job_id)?;
        let job = self.load(job_id).await?;
        if !job.status.can_transition_to(JobStatus::RolledBack) {
            return Err(ScopeError::validation(format!(
                "job '{}' is {} and cannot be rolled back",
                job_id, job.status
            )));
        }

        let span = tracing::info_span!("migration_rollback", job_id = %job.id);
        self.rollback_items(job).instrument(span).await
    }

    async fn rollback_items(&self, mut job: MigrationJob) -> Result<MigrationJob> {
        let target = job.plan.target.clone();
        let kinds: Vec<StorageKind> = job.checkpoint.entries().map(|(kind, _)| kind).collect();
        let mut removed = 0usize;
        let mut remaining = 0usize;

        for kind in kinds {
            let keys: Vec<String> = job
                .checkpoint
                .entry(kind)
                .map(|entry| entry.migrated.iter().cloned().collect())
                .unwrap_or_default();
            if keys.is_empty() {
                continue;
            }

            let Some(adapter) = self.adapters.get(&kind).cloned() else {
                let err = ScopeError::execution(format!(
                    "no storage adapter registered for {}",
                    kind
                ));
                job.record_error(JobError::storage_kind(kind, &err));
                remaining += keys.len();
                continue;
            };
            let address = ScopeAddress::derive(&target, adapter.family())?;

            for key in keys {
                let target_item = address.item(&key)?;
                match self.remove_item(adapter.as_ref(), &target_item, &job.id).await {
                    Ok(Removal::Removed) => removed += 1,
                    Ok(Removal::Missing) => {}
                    Ok(Removal::Foreign) => {
                        let err = ScopeError::conflict(
                            target_item.render(),
                            "overwritten by another writer; not deleted",
                        );
                        tracing::warn!(
                            job_id = %job.id,
                            storage_kind = %kind,
                            legacy_key = %key,
                            target = %target_item,
                            "Skipping target not written by this job"
                        );
                        job.record_error(JobError::item(
                            kind,
                            &key,
                            Some(target_item.render()),
                            &err,
                        ));
                    }
                    Err(err) => {
                        tracing::warn!(
                            job_id = %job.id,
                            storage_kind = %kind,
                            legacy_key = %key,
                            error = %err,
                            "Rollback delete failed"
                        );
                        job.record_error(JobError::item(
                            kind,
                            &key,
                            Some(target_item.render()),
                            &err,
                        ));
                        remaining += 1;
                        continue;
                    }
                }
                job.checkpoint.entry_mut(kind).migrated.remove(&key);
            }

            let entry = job.checkpoint.entry_mut(kind);
            entry.complete = false;
            entry.resume_token = None;
            entry.last_migrated = None;
        }

        if remaining > 0 {
            job.touch();
            self.repository.save(&job).await?;
            return Err(ScopeError::execution(format!(
                "rollback of job '{}' left {} items in place",
                job.id, remaining
            )));
        }

        let previous = job.status;
        job.transition(JobStatus::RolledBack)?;
        self.repository.save(&job).await?;
        tracing::info!(job_id = %job.id, from = %previous, removed, "Job rolled back");
        Ok(job)
    }

    async fn remove_item(
        &self,
        adapter: &dyn StorageAdapter,
        target: &ItemAddress,
        job_id: &str,
    ) -> Result<Removal> {
        let existing = adapter.read(target).await.map_err(|e| {
            ScopeError::execution(format!("reading '{}' failed: {}", target, e))
        })?;
        match existing {
            None => Ok(Removal::Missing),
            Some(item) if !item.written_by(job_id) => Ok(Removal::Foreign),
            Some(_) => {
                adapter.delete(target).await.map_err(|e| {
                    ScopeError::execution(format!("deleting '{}' failed: {}", target, e))
                })?;
                Ok(Removal::Removed)
            }
        }
    }

    // ============================================================================
    // Queries
    // ============================================================================

    /// Loads a job.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no job has this id.
    pub async fn load(&self, job_id: &str) -> Result<MigrationJob> {
        self.repository
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| ScopeError::not_found("migration_job", job_id))
    }

    pub async fn status(&self, job_id: &str) -> Result<JobStatusReport> {
        Ok(self.load(job_id).await?.status_report())
    }

    /// All persisted jobs, oldest first.
    pub async fn list_jobs(&self) -> Result<Vec<MigrationJob>> {
        self.repository.list_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use srn_core::addressing::BackendFamily;
    use srn_core::migration::{InMemoryJobRepository, InMemoryLeaseProvider, MemoryAdapter};
    use srn_core::ErrorKind;

    const WS: &str = "abc12345abcd12345abc1234567890ab";

    fn target() -> Scope {
        Scope::from_string(&format!("1.{}.user.john.proj_research", WS)).unwrap()
    }

    async fn engine_with(items: &[&str]) -> (MigrationEngine, Arc<MemoryAdapter>) {
        let kv = Arc::new(MemoryAdapter::new(StorageKind::KvStore, BackendFamily::Keyed));
        for key in items {
            kv.insert_legacy(WS, key, json!({ "key": key })).await;
        }
        let engine = MigrationEngine::new(
            Arc::new(InMemoryJobRepository::new()),
            Arc::new(InMemoryLeaseProvider::new()),
        )
        .with_adapter(kv.clone());
        (engine, kv)
    }

    #[tokio::test]
    async fn test_discover_and_plan() {
        let (engine, _) = engine_with(&["a", "b"]).await;
        let inventory = engine.discover(WS).await.unwrap();
        assert_eq!(inventory.count(StorageKind::KvStore), 2);
        assert_eq!(engine.discover_workspaces().await.unwrap(), vec![WS.to_string()]);

        let plan = engine.plan(&inventory, &target()).unwrap();
        assert_eq!(plan.storage_kinds, vec![StorageKind::KvStore]);
        assert!(engine.discover("  ").await.is_err());
    }

    #[tokio::test]
    async fn test_execute_completes() {
        let (engine, kv) = engine_with(&["a", "b", "c"]).await;
        let plan = engine.plan_for(WS, &target()).await.unwrap();

        let job = engine
            .execute(plan, ExecutionOptions::default().with_batch_size(2), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.processed_count, 3);
        assert_eq!(kv.target_count().await, 3);
        assert_eq!(kv.legacy_count(WS).await, 3);

        let report = engine.status(&job.id).await.unwrap();
        assert_eq!(report.progress_percent, 100.0);
        assert!(engine.resume(&job.id, ExecutionOptions::default(), CancellationToken::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_batch() {
        let (engine, kv) = engine_with(&["a"]).await;
        let plan = engine.plan_for(WS, &target()).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let job = engine
            .execute(plan, ExecutionOptions::default(), cancel)
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.errors.last().unwrap().kind, ErrorKind::Cancelled);
        assert_eq!(kv.target_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let (engine, _) = engine_with(&[]).await;
        let err = engine.status("nope").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(engine.rollback("nope").await.unwrap_err().is_not_found());
    }
}
