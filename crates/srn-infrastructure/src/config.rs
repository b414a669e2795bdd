//! Application configuration loaded from `srn.toml`.
//!
//! ```toml
//! [storage]
//! working_dir = "/var/lib/rag"
//!
//! [migration]
//! batch_size = 200
//! jobs_dir = "/var/lib/rag/.srn/jobs"
//!
//! [legacy]
//! default_subject_type = "system"
//! default_subject_id = "default"
//!
//! [throughput]
//! vector_store = 50.0
//! ```
//!
//! Every section and key is optional.

use serde::{Deserialize, Serialize};
use srn_core::error::{Result, ScopeError};
use srn_core::migration::{ExecutionOptions, StorageKind, Throughput, DEFAULT_BATCH_SIZE};
use srn_core::scope::ScopeResolver;
use srn_core::srn::SubjectType;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::paths::SrnPaths;
use crate::storage::AtomicFile;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Root directory of the file-backed stores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSection {
    pub batch_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs_dir: Option<PathBuf>,
}

impl Default for MigrationSection {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            jobs_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacySection {
    pub default_subject_type: SubjectType,
    pub default_subject_id: String,
}

impl Default for LegacySection {
    fn default() -> Self {
        Self {
            default_subject_type: SubjectType::System,
            default_subject_id: "default".to_string(),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SrnConfig {
    pub storage: StorageSection,
    pub migration: MigrationSection,
    pub legacy: LegacySection,
    /// Items/second overrides per storage kind.
    pub throughput: BTreeMap<StorageKind, f64>,
}

impl SrnConfig {
    /// Loads the config at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let config = AtomicFile::<SrnConfig>::toml(path.to_path_buf())
            .load()?
            .unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Loads `<config_dir>/srn/srn.toml`.
    pub fn load_default() -> Result<Self> {
        Self::load(&SrnPaths::config_file()?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        AtomicFile::<SrnConfig>::toml(path.to_path_buf()).save(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.migration.batch_size == 0 {
            return Err(ScopeError::config("migration.batch_size must be at least 1"));
        }
        for (kind, rate) in &self.throughput {
            if !rate.is_finite() || *rate <= 0.0 {
                return Err(ScopeError::config(format!(
                    "throughput.{} must be a positive number, got {}",
                    kind, rate
                )));
            }
        }
        // fails early on a subject id the grammar would reject
        self.resolver()?;
        Ok(())
    }

    /// Overrides the working directory (CLI `--working-dir`).
    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.storage.working_dir = Some(working_dir.into());
        self
    }

    /// Configured working directory, or the platform data directory.
    pub fn working_dir(&self) -> Result<PathBuf> {
        match &self.storage.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => SrnPaths::data_dir(),
        }
    }

    pub fn jobs_dir(&self) -> Result<PathBuf> {
        match &self.migration.jobs_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(SrnPaths::jobs_dir(&self.working_dir()?)),
        }
    }

    pub fn leases_dir(&self) -> Result<PathBuf> {
        Ok(SrnPaths::leases_dir(&self.working_dir()?))
    }

    pub fn resolver(&self) -> Result<ScopeResolver> {
        ScopeResolver::new(
            self.legacy.default_subject_type,
            self.legacy.default_subject_id.clone(),
        )
    }

    pub fn throughput(&self) -> Throughput {
        self.throughput
            .iter()
            .fold(Throughput::default(), |acc, (kind, rate)| {
                acc.with_rate(*kind, *rate)
            })
    }

    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions::default().with_batch_size(self.migration.batch_size)
    }
}
