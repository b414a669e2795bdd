//! Unified path management for srn configuration and job files.
//!
//! Default locations are resolved via AppPaths from the version-migrate crate
//! so they follow platform conventions (XDG on Linux/macOS, appropriate
//! directories on Windows).

use srn_core::error::{Result, ScopeError};
use std::path::{Path, PathBuf};
use version_migrate::AppPaths;

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "srn.toml";

/// Directory (relative to the working directory) holding srn state.
pub const STATE_DIR_NAME: &str = ".srn";

/// Log file written into the working directory by the CLI.
pub const MIGRATION_LOG_FILE: &str = "scope_migration.log";

/// Unified path management for srn.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/srn/               # Config directory (AppPaths default)
/// └── srn.toml                 # Application configuration
///
/// <working_dir>/               # Storage root for the file-backed adapters
/// ├── scope_migration.log      # Migration log (CLI)
/// └── .srn/
///     ├── jobs/                # One TOML record per migration job
///     └── leases/              # Per-job lease lock files
/// ```
pub struct SrnPaths;

impl SrnPaths {
    fn app_paths() -> AppPaths {
        AppPaths::new("srn")
    }

    /// Returns the srn configuration directory (e.g. `~/.config/srn/`).
    pub fn config_dir() -> Result<PathBuf> {
        Self::app_paths()
            .config_dir()
            .map_err(|e| ScopeError::config(format!("Cannot resolve config directory: {}", e)))
    }

    /// Returns the srn data directory (e.g. `~/.local/share/srn/`).
    ///
    /// Used as the working directory when neither the CLI nor the config
    /// names one.
    pub fn data_dir() -> Result<PathBuf> {
        Self::app_paths()
            .data_dir()
            .map_err(|e| ScopeError::config(format!("Cannot resolve data directory: {}", e)))
    }

    /// Returns the path to the default configuration file.
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// `<working_dir>/.srn/jobs`
    pub fn jobs_dir(working_dir: &Path) -> PathBuf {
        working_dir.join(STATE_DIR_NAME).join("jobs")
    }

    /// `<working_dir>/.srn/leases`
    pub fn leases_dir(working_dir: &Path) -> PathBuf {
        working_dir.join(STATE_DIR_NAME).join("leases")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_working_dir_layout() {
        let root = Path::new("/tmp/work");
        assert_eq!(SrnPaths::jobs_dir(root), PathBuf::from("/tmp/work/.srn/jobs"));
        assert_eq!(
            SrnPaths::leases_dir(root),
            PathBuf::from("/tmp/work/.srn/leases")
        );
    }

    #[test]
    fn test_config_file_name() {
        if let Ok(path) = SrnPaths::config_file() {
            assert!(path.ends_with("srn/srn.toml"));
        }
    }
}
