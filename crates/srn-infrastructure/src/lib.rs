pub mod adapters;
pub mod config;
pub mod dto;
pub mod lease;
pub mod paths;
pub mod storage;
pub mod toml_migration_job_repository;

pub use crate::adapters::{FsTreeAdapter, JsonKvFileAdapter, working_dir_adapters};
pub use crate::config::SrnConfig;
pub use crate::lease::FileLeaseProvider;
pub use crate::paths::SrnPaths;
pub use crate::toml_migration_job_repository::TomlMigrationJobRepository;
