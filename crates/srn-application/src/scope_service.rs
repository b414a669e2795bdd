//! Scope Service
//!
//! Boundary operations consumed by API handlers and the CLI: SRN parsing and
//! validation, address derivation, migration validation and status polling.
//! Every failure leaves this module as an [`ErrorResponse`] carrying a
//! machine-readable kind.

use serde::{Deserialize, Serialize};
use srn_core::addressing::ScopeAddress;
use srn_core::error::{ErrorKind, ScopeError};
use srn_core::migration::{ExecutionOptions, JobError, JobStatus, StorageKind};
use srn_core::scope::Scope;
use srn_core::srn;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::migration_engine::MigrationEngine;

/// Structured error returned across the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
}

impl From<&ScopeError> for ErrorResponse {
    fn from(error: &ScopeError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            segment: error.segment().map(str::to_string),
        }
    }
}

impl From<ScopeError> for ErrorResponse {
    fn from(error: ScopeError) -> Self {
        Self::from(&error)
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ErrorResponse {}

pub type ServiceResult<T> = std::result::Result<T, ErrorResponse>;

/// Parsed SRN components plus derived facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSrn {
    pub canonical: String,
    pub version: String,
    pub workspace: String,
    pub subject_type: String,
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub depth: usize,
}

impl From<&Scope> for ParsedSrn {
    fn from(scope: &Scope) -> Self {
        let components = scope.components();
        Self {
            canonical: scope.as_str().to_string(),
            version: components.version().to_string(),
            workspace: scope.workspace().to_string(),
            subject_type: scope.subject_type().to_string(),
            subject_id: scope.subject_id().to_string(),
            project: scope.project().map(str::to_string),
            thread: scope.thread().map(str::to_string),
            topic: scope.topic().map(str::to_string),
            depth: scope.depth(),
        }
    }
}

/// One backend-native rendering of a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressView {
    pub family: String,
    pub address: String,
}

impl From<&ScopeAddress> for AddressView {
    fn from(address: &ScopeAddress) -> Self {
        Self {
            family: address.family().to_string(),
            address: address.render(),
        }
    }
}

/// Migration entry point input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRequest {
    pub source_workspace: String,
    pub target_scope: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

/// Plan validation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationValidation {
    pub job_id: String,
    pub status: JobStatus,
    pub estimated_items: BTreeMap<StorageKind, u64>,
    /// Seconds.
    pub estimated_time: f64,
    pub storage_kinds: Vec<StorageKind>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Items a dry run found conflicting; empty otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<JobError>,
}

/// Status polling result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub processed_count: u64,
    pub errors: Vec<JobError>,
}

/// Boundary facade over parsing and the migration engine.
pub struct ScopeService {
    engine: Arc<MigrationEngine>,
}

impl ScopeService {
    pub fn new(engine: Arc<MigrationEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<MigrationEngine> {
        &self.engine
    }

    /// Validates a raw SRN without returning its components.
    pub fn validate_srn(&self, raw: &str) -> ServiceResult<()> {
        srn::validate(raw).map_err(ErrorResponse::from)
    }

    /// Parses a raw SRN into its components.
    pub fn parse_srn(&self, raw: &str) -> ServiceResult<ParsedSrn> {
        let scope = Scope::from_string(raw)?;
        Ok(ParsedSrn::from(&scope))
    }

    /// Renders a scope in every backend family.
    pub fn derive_addresses(&self, raw: &str) -> ServiceResult<Vec<AddressView>> {
        let scope = Scope::from_string(raw)?;
        let addresses = ScopeAddress::derive_all(&scope)?;
        Ok(addresses.iter().map(AddressView::from).collect())
    }

    /// Plans a migration.
    ///
    /// A dry run executes the plan without writing and returns the preview;
    /// otherwise a pending job is persisted for later execution.
    pub async fn validate_migration(
        &self,
        request: MigrationRequest,
    ) -> ServiceResult<MigrationValidation> {
        let target = Scope::from_string(&request.target_scope)?;
        let plan = self
            .engine
            .plan_for(&request.source_workspace, &target)
            .await?;

        let mut options = ExecutionOptions::default();
        if let Some(batch_size) = request.batch_size {
            options = options.with_batch_size(batch_size);
        }
        options.validate()?;

        let (job, conflicts) = if request.dry_run {
            options.dry_run = true;
            let preview = self
                .engine
                .execute(plan, options, CancellationToken::new())
                .await?;
            let conflicts = preview
                .errors
                .iter()
                .filter(|error| error.kind == ErrorKind::MigrationConflict)
                .cloned()
                .collect();
            (preview, conflicts)
        } else {
            (self.engine.submit(plan).await?, Vec::new())
        };

        Ok(MigrationValidation {
            job_id: job.id.clone(),
            status: job.status,
            estimated_items: job.plan.estimated_items.clone(),
            estimated_time: job.plan.estimated_duration().as_secs_f64(),
            storage_kinds: job.plan.storage_kinds.clone(),
            warnings: job.plan.warnings.clone(),
            conflicts,
        })
    }

    pub async fn job_status(&self, job_id: &str) -> ServiceResult<JobStatusResponse> {
        let report = self.engine.status(job_id).await?;
        Ok(JobStatusResponse {
            job_id: report.job_id,
            status: report.status,
            processed_count: report.processed_count,
            errors: report.errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use srn_core::addressing::BackendFamily;
    use srn_core::migration::{InMemoryJobRepository, InMemoryLeaseProvider, MemoryAdapter};

    const WS: &str = "abc12345abcd12345abc1234567890ab";

    fn service() -> ScopeService {
        let engine = MigrationEngine::new(
            Arc::new(InMemoryJobRepository::new()),
            Arc::new(InMemoryLeaseProvider::new()),
        );
        ScopeService::new(Arc::new(engine))
    }

    #[test]
    fn test_parse_srn() {
        let parsed = service()
            .parse_srn(&format!("  1.{}.USER.john.proj_research ", WS))
            .unwrap();
        assert_eq!(parsed.canonical, format!("1.{}.user.john.proj_research", WS));
        assert_eq!(parsed.subject_type, "user");
        assert_eq!(parsed.project.as_deref(), Some("research"));
        assert_eq!(parsed.depth, 1);
    }

    #[test]
    fn test_error_response_carries_kind_and_segment() {
        let err = service().parse_srn("1.nothex.user.john").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidWorkspace);
        assert!(err.message.contains("nothex"));

        let err = service().validate_srn("").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidFormat);
        assert!(err.segment.is_some());

        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["kind"], json!("invalid_format"));
    }

    #[test]
    fn test_derive_addresses_covers_every_family() {
        let views = service()
            .derive_addresses(&format!("1.{}.user.john", WS))
            .unwrap();
        assert_eq!(views.len(), 4);
        assert!(views.iter().any(|v| v.family == BackendFamily::Keyed.to_string()
            && v.address == format!("{}:user:john", WS)));
    }

    #[tokio::test]
    async fn test_validate_migration_and_status() {
        let kv = Arc::new(MemoryAdapter::new(StorageKind::KvStore, BackendFamily::Keyed));
        kv.insert_legacy(WS, "a", json!(1)).await;
        let engine = MigrationEngine::new(
            Arc::new(InMemoryJobRepository::new()),
            Arc::new(InMemoryLeaseProvider::new()),
        )
        .with_adapter(kv.clone());
        let service = ScopeService::new(Arc::new(engine));

        let request = MigrationRequest {
            source_workspace: WS.to_string(),
            target_scope: format!("1.{}.user.john", WS),
            dry_run: true,
            batch_size: Some(10),
        };
        let preview = service.validate_migration(request.clone()).await.unwrap();
        assert_eq!(preview.status, JobStatus::Completed);
        assert_eq!(preview.estimated_items[&StorageKind::KvStore], 1);
        assert_eq!(kv.target_count().await, 0);
        assert!(service.job_status(&preview.job_id).await.is_err());

        let submitted = service
            .validate_migration(MigrationRequest {
                dry_run: false,
                ..request
            })
            .await
            .unwrap();
        assert_eq!(submitted.status, JobStatus::Pending);
        let status = service.job_status(&submitted.job_id).await.unwrap();
        assert_eq!(status.processed_count, 0);
        assert!(status.errors.is_empty());
    }

    #[tokio::test]
    async fn test_validate_migration_rejects_zero_batch() {
        let err = service()
            .validate_migration(MigrationRequest {
                source_workspace: WS.to_string(),
                target_scope: format!("1.{}.user.john", WS),
                dry_run: false,
                batch_size: Some(0),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MigrationValidation);
    }
}
