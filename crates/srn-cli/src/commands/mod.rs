pub mod migrate;
pub mod scope;

use anyhow::{Context, Result};
use serde::Serialize;
use srn_application::MigrationEngine;
use srn_infrastructure::{
    FileLeaseProvider, SrnConfig, SrnPaths, TomlMigrationJobRepository, working_dir_adapters,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loads the configuration and applies the `--working-dir` override.
pub fn load_config(path: Option<&Path>, working_dir: Option<PathBuf>) -> Result<SrnConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => SrnPaths::config_file()?,
    };
    let config = SrnConfig::load(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    Ok(match working_dir {
        Some(dir) => config.with_working_dir(dir),
        None => config,
    })
}

/// Engine over the file-backed stores of the configured working directory.
pub fn build_engine(config: &SrnConfig) -> Result<MigrationEngine> {
    let working_dir = config.working_dir()?;
    tracing::debug!(working_dir = %working_dir.display(), "Using working directory");

    let engine = MigrationEngine::new(
        Arc::new(TomlMigrationJobRepository::new(config.jobs_dir()?)),
        Arc::new(FileLeaseProvider::new(config.leases_dir()?)),
    )
    .with_adapters(working_dir_adapters(&working_dir))
    .with_resolver(config.resolver()?)
    .with_throughput(config.throughput());
    Ok(engine)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
