//! File-backed storage adapters.
//!
//! - `fs_tree`: hierarchical path family, one JSON file per item
//! - `json_kv_file`: keyed family, one JSON object file per namespace

mod fs_tree;
mod json_kv_file;

pub use fs_tree::FsTreeAdapter;
pub use json_kv_file::{JsonKvFileAdapter, SCOPED_DIR};

use srn_core::migration::{StorageAdapter, StorageKind};
use std::path::Path;
use std::sync::Arc;

/// Adapters for every storage kind rooted at one working directory.
///
/// Key-value caches and document status live in namespace files; vector and
/// graph items live in the directory tree.
pub fn working_dir_adapters(working_dir: &Path) -> Vec<Arc<dyn StorageAdapter>> {
    let root = working_dir.to_path_buf();
    vec![
        Arc::new(JsonKvFileAdapter::new(root.clone(), StorageKind::KvStore)),
        Arc::new(FsTreeAdapter::new(root.clone(), StorageKind::VectorStore)),
        Arc::new(FsTreeAdapter::new(root.clone(), StorageKind::GraphStore)),
        Arc::new(JsonKvFileAdapter::new(root, StorageKind::DocStatus)),
    ]
}
