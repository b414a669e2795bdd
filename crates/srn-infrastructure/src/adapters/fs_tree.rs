//! File-tree storage adapter (hierarchical path family).
//!
//! ```text
//! <root>/
//! ├── <workspace>/<kind>/<key>.json                     # legacy items (raw payload)
//! └── <workspace>/<subject_type>/<subject_id>
//!     [/proj_<p>][/thr_<t>][/top_<t>]/<kind>/<key>.json  # migrated items (StoredItem)
//! ```
//!
//! Storage kind names never collide with subject type names, so legacy and
//! scoped trees can share a workspace directory.

use async_trait::async_trait;
use srn_core::addressing::{BackendFamily, ItemAddress, ScopeAddress};
use srn_core::error::{Result, ScopeError};
use srn_core::migration::{LegacyItem, LegacyPage, StorageAdapter, StorageKind, StoredItem};
use srn_core::scope::{Scope, ScopeResolver};
use srn_core::srn::grammar::{PROJECT_PREFIX, THREAD_PREFIX, TOPIC_PREFIX};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::task;

use crate::storage::write_atomic;

const ITEM_EXTENSION: &str = "json";

/// Hierarchical-path adapter over a directory tree.
#[derive(Debug, Clone)]
pub struct FsTreeAdapter {
    root: PathBuf,
    kind: StorageKind,
}

impl FsTreeAdapter {
    pub fn new(root: PathBuf, kind: StorageKind) -> Self {
        Self { root, kind }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn legacy_dir(&self, workspace: &str) -> Result<PathBuf> {
        if workspace.is_empty() || workspace.contains(['/', '\\', '\0']) || workspace.starts_with('.') {
            return Err(ScopeError::storage(format!(
                "'{}' is not a usable workspace directory name",
                workspace
            )));
        }
        Ok(self.root.join(workspace).join(self.kind.as_str()))
    }

    /// File holding the item at `address`.
    fn item_path(&self, address: &ItemAddress) -> Result<PathBuf> {
        let ScopeAddress::HierarchicalPath(path) = address.scope_address() else {
            return Err(ScopeError::storage(format!(
                "{} adapter cannot address {} item '{}'",
                BackendFamily::HierarchicalPath,
                address.family(),
                address
            )));
        };

        let mut file = self.root.clone();
        for segment in path.segments() {
            file.push(segment);
        }
        file.push(self.kind.as_str());
        file.push(format!("{}.{}", address.key(), ITEM_EXTENSION));
        Ok(file)
    }

    fn spawn_error(e: task::JoinError) -> ScopeError {
        ScopeError::io(format!("Failed to spawn blocking task: {}", e))
    }

    /// File name as UTF-8, logging names that cannot be addressed.
    fn utf8_name(path: &Path) -> Option<&str> {
        let name = path.file_name()?;
        let utf8 = name.to_str();
        if utf8.is_none() {
            tracing::warn!(path = %path.display(), "Skipping entry with non-UTF-8 name");
        }
        utf8
    }

    /// The first `limit` legacy keys after `resume_token`, sorted, and
    /// whether more follow.
    fn legacy_keys_sync(
        dir: &Path,
        resume_token: Option<&str>,
        limit: usize,
    ) -> Result<(Vec<String>, bool)> {
        if !dir.is_dir() {
            return Ok((Vec::new(), false));
        }
        let mut keys = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = Self::utf8_name(&path) else {
                continue;
            };
            let Some(key) = name.strip_suffix(ITEM_EXTENSION).and_then(|stem| stem.strip_suffix('.'))
            else {
                continue;
            };
            if key.is_empty() || key.starts_with('.') {
                continue;
            }
            if resume_token.is_none_or(|token| key > token) {
                keys.push(key.to_string());
            }
        }

        let more = keys.len() > limit;
        if more {
            // Only the page needs ordering.
            keys.select_nth_unstable(limit);
            keys.truncate(limit);
        }
        keys.sort();
        Ok((keys, more))
    }

    fn list_legacy_sync(
        dir: &Path,
        resume_token: Option<&str>,
        limit: usize,
    ) -> Result<LegacyPage> {
        let (keys, more) = Self::legacy_keys_sync(dir, resume_token, limit)?;

        let mut items = Vec::with_capacity(keys.len());
        for key in &keys {
            let path = dir.join(format!("{}.{}", key, ITEM_EXTENSION));
            let content = fs::read_to_string(&path).map_err(|e| {
                ScopeError::io(format!("Failed to read '{}': {}", path.display(), e))
            })?;
            let payload = serde_json::from_str(&content).map_err(|e| {
                ScopeError::serialization(
                    "JSON",
                    format!("Failed to parse '{}': {}", path.display(), e),
                )
            })?;
            items.push(LegacyItem {
                key: key.clone(),
                payload,
            });
        }

        let next_token = if more { keys.last().cloned() } else { None };
        Ok(LegacyPage { items, next_token })
    }

    /// Returns true if `dir` holds at least one item file.
    fn has_items_sync(dir: &Path) -> Result<bool> {
        if !dir.is_dir() {
            return Ok(false);
        }
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == ITEM_EXTENSION) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn read_sync(path: &Path) -> Result<Option<StoredItem>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .map_err(|e| ScopeError::io(format!("Failed to read '{}': {}", path.display(), e)))?;
        let item = serde_json::from_str(&content).map_err(|e| {
            ScopeError::serialization(
                "JSON",
                format!("Failed to parse '{}': {}", path.display(), e),
            )
        })?;
        Ok(Some(item))
    }

    fn legacy_workspaces_sync(root: &Path, kind: StorageKind) -> Result<Vec<String>> {
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let mut workspaces = Vec::new();
        for entry in fs::read_dir(root)? {
            let path = entry?.path();
            if !path.join(kind.as_str()).is_dir() {
                continue;
            }
            let Some(name) = Self::utf8_name(&path) else {
                continue;
            };
            if !name.starts_with('.') {
                workspaces.push(name.to_string());
            }
        }
        workspaces.sort();
        Ok(workspaces)
    }

    fn child_dirs(dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(name) = Self::utf8_name(&path) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Walks `<ws>/<type>/<id>` and nested prefixed levels, collecting every
    /// directory that holds items of this adapter's kind.
    fn scan_scopes_sync(root: &Path, kind: StorageKind) -> Result<Vec<Scope>> {
        fn walk(
            dir: &Path,
            segments: &mut Vec<String>,
            kind: StorageKind,
            found: &mut Vec<Scope>,
        ) -> Result<()> {
            if segments.len() >= 3 {
                if dir.join(kind.as_str()).is_dir() {
                    if let Ok(scope) = ScopeAddress::parse_path(segments) {
                        found.push(scope);
                    }
                }
                if segments.len() >= 6 {
                    return Ok(());
                }
            }

            for name in FsTreeAdapter::child_dirs(dir)? {
                let descend = match segments.len() {
                    0..=2 => !name.starts_with('.') && name != kind.as_str(),
                    _ => [PROJECT_PREFIX, THREAD_PREFIX, TOPIC_PREFIX]
                        .iter()
                        .any(|prefix| name.starts_with(prefix)),
                };
                if descend {
                    segments.push(name.clone());
                    walk(&dir.join(&name), segments, kind, found)?;
                    segments.pop();
                }
            }
            Ok(())
        }

        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let mut found = Vec::new();
        walk(root, &mut Vec::new(), kind, &mut found)?;
        found.sort();
        Ok(found)
    }

    /// Lists scopes that hold items of this kind, optionally filtered by a
    /// shell-style pattern over canonical SRN strings.
    pub async fn list_scopes(&self, pattern: Option<&str>) -> Result<Vec<Scope>> {
        let root = self.root.clone();
        let kind = self.kind;
        let scopes = task::spawn_blocking(move || Self::scan_scopes_sync(&root, kind))
            .await
            .map_err(Self::spawn_error)??;

        match pattern {
            Some(pattern) => ScopeResolver::default().find_matching(pattern, &scopes),
            None => Ok(scopes),
        }
    }
}

#[async_trait]
impl StorageAdapter for FsTreeAdapter {
    fn kind(&self) -> StorageKind {
        self.kind
    }

    fn family(&self) -> BackendFamily {
        BackendFamily::HierarchicalPath
    }

    async fn list_legacy(
        &self,
        workspace: &str,
        resume_token: Option<&str>,
        limit: usize,
    ) -> Result<LegacyPage> {
        let dir = self.legacy_dir(workspace)?;
        let resume_token = resume_token.map(str::to_string);

        task::spawn_blocking(move || Self::list_legacy_sync(&dir, resume_token.as_deref(), limit))
            .await
            .map_err(Self::spawn_error)?
    }

    async fn write(&self, address: &ItemAddress, item: &StoredItem) -> Result<()> {
        let path = self.item_path(address)?;
        let bytes = serde_json::to_vec_pretty(item)?;

        task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(Self::spawn_error)?
    }

    async fn read(&self, address: &ItemAddress) -> Result<Option<StoredItem>> {
        let path = self.item_path(address)?;

        task::spawn_blocking(move || Self::read_sync(&path))
            .await
            .map_err(Self::spawn_error)?
    }

    async fn delete(&self, address: &ItemAddress) -> Result<()> {
        let path = self.item_path(address)?;

        task::spawn_blocking(move || {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| {
                    ScopeError::io(format!("Failed to delete '{}': {}", path.display(), e))
                })?;
            }
            Ok(())
        })
        .await
        .map_err(Self::spawn_error)?
    }

    async fn has_target_items(&self, address: &ScopeAddress) -> Result<bool> {
        let ScopeAddress::HierarchicalPath(path) = address else {
            return Err(ScopeError::storage(format!(
                "{} adapter cannot address {} scope '{}'",
                BackendFamily::HierarchicalPath,
                address.family(),
                address
            )));
        };
        let mut dir = self.root.clone();
        for segment in path.segments() {
            dir.push(segment);
        }
        dir.push(self.kind.as_str());

        task::spawn_blocking(move || Self::has_items_sync(&dir))
            .await
            .map_err(Self::spawn_error)?
    }

    async fn legacy_workspaces(&self) -> Result<Vec<String>> {
        let root = self.root.clone();
        let kind = self.kind;

        task::spawn_blocking(move || Self::legacy_workspaces_sync(&root, kind))
            .await
            .map_err(Self::spawn_error)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WS: &str = "abc12345abcd12345abc1234567890ab";

    fn seed_legacy(root: &Path, workspace: &str, kind: StorageKind, keys: &[&str]) {
        let dir = root.join(workspace).join(kind.as_str());
        fs::create_dir_all(&dir).unwrap();
        for key in keys {
            fs::write(
                dir.join(format!("{}.json", key)),
                json!({ "id": key }).to_string(),
            )
            .unwrap();
        }
    }

    fn address(scope: &str, key: &str) -> ItemAddress {
        let scope = Scope::from_string(&format!("1.{}.{}", WS, scope)).unwrap();
        ScopeAddress::derive(&scope, BackendFamily::HierarchicalPath)
            .unwrap()
            .item(key)
            .unwrap()
    }

    #[tokio::test]
    async fn test_legacy_listing_pages() {
        let temp_dir = tempfile::tempdir().unwrap();
        seed_legacy(temp_dir.path(), WS, StorageKind::VectorStore, &["v3", "v1", "v2"]);
        let adapter = FsTreeAdapter::new(temp_dir.path().to_path_buf(), StorageKind::VectorStore);

        let first = adapter.list_legacy(WS, None, 2).await.unwrap();
        let keys: Vec<&str> = first.items.iter().map(|item| item.key.as_str()).collect();
        assert_eq!(keys, vec!["v1", "v2"]);
        assert_eq!(first.next_token.as_deref(), Some("v2"));
        assert_eq!(first.items[0].payload, json!({ "id": "v1" }));

        let second = adapter
            .list_legacy(WS, first.next_token.as_deref(), 2)
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(second.next_token.is_none());

        assert_eq!(adapter.count_legacy(WS).await.unwrap(), 3);
        assert!(adapter.list_legacy("missing", None, 2).await.unwrap().items.is_empty());
        assert!(adapter.list_legacy("../etc", None, 2).await.is_err());
    }

    #[tokio::test]
    async fn test_legacy_listing_pages_unsorted_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let keys: Vec<String> = (0..25).rev().map(|i| format!("k{:02}", i)).collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        seed_legacy(temp_dir.path(), WS, StorageKind::KvStore, &refs);
        let adapter = FsTreeAdapter::new(temp_dir.path().to_path_buf(), StorageKind::KvStore);

        let mut seen = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = adapter.list_legacy(WS, token.as_deref(), 7).await.unwrap();
            assert!(page.items.len() <= 7);
            seen.extend(page.items.into_iter().map(|item| item.key));
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        let mut expected = keys.clone();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_legacy_listing_skips_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = tempfile::tempdir().unwrap();
        seed_legacy(temp_dir.path(), WS, StorageKind::VectorStore, &["v1", "v2"]);
        let dir = temp_dir.path().join(WS).join(StorageKind::VectorStore.as_str());
        let bad_name = OsStr::from_bytes(b"bad-\xff.json");
        if fs::write(dir.join(bad_name), "{}").is_err() {
            // Filesystem refuses non-UTF-8 names.
            return;
        }
        let adapter = FsTreeAdapter::new(temp_dir.path().to_path_buf(), StorageKind::VectorStore);

        let page = adapter.list_legacy(WS, None, 10).await.unwrap();
        let keys: Vec<&str> = page.items.iter().map(|item| item.key.as_str()).collect();
        assert_eq!(keys, vec!["v1", "v2"]);
        assert_eq!(adapter.count_legacy(WS).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_has_target_items() {
        let temp_dir = tempfile::tempdir().unwrap();
        let adapter = FsTreeAdapter::new(temp_dir.path().to_path_buf(), StorageKind::GraphStore);
        let target = address("user.john", "n1");
        let narrower = address("user.john.proj_p", "n2");
        assert!(!adapter.has_target_items(target.scope_address()).await.unwrap());

        adapter
            .write(&narrower, &StoredItem::new(json!({})))
            .await
            .unwrap();
        assert!(!adapter.has_target_items(target.scope_address()).await.unwrap());
        assert!(adapter.has_target_items(narrower.scope_address()).await.unwrap());

        adapter.write(&target, &StoredItem::new(json!({}))).await.unwrap();
        assert!(adapter.has_target_items(target.scope_address()).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_read_delete_target() {
        let temp_dir = tempfile::tempdir().unwrap();
        let adapter = FsTreeAdapter::new(temp_dir.path().to_path_buf(), StorageKind::GraphStore);
        let address = address("user.john.proj_research", "node-1");
        let item = StoredItem::migrated(json!({ "label": "n" }), "job-1", "node-1");

        adapter.write(&address, &item).await.unwrap();
        let file = temp_dir
            .path()
            .join(WS)
            .join("user/john/proj_research/graph_store/node-1.json");
        assert!(file.exists());
        assert_eq!(adapter.read(&address).await.unwrap(), Some(item));

        adapter.delete(&address).await.unwrap();
        adapter.delete(&address).await.unwrap();
        assert!(adapter.read(&address).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_other_families() {
        let temp_dir = tempfile::tempdir().unwrap();
        let adapter = FsTreeAdapter::new(temp_dir.path().to_path_buf(), StorageKind::GraphStore);
        let scope = Scope::from_string(&format!("1.{}.user.john", WS)).unwrap();
        let keyed = ScopeAddress::derive(&scope, BackendFamily::Keyed)
            .unwrap()
            .item("k")
            .unwrap();
        let err = adapter.read(&keyed).await.unwrap_err();
        assert_eq!(err.kind(), srn_core::ErrorKind::Storage);
    }

    #[tokio::test]
    async fn test_workspaces_and_scopes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        seed_legacy(root, WS, StorageKind::VectorStore, &["v1"]);
        seed_legacy(root, "legacy-docs", StorageKind::VectorStore, &["v1"]);
        seed_legacy(root, "other", StorageKind::GraphStore, &["g1"]);
        fs::create_dir_all(root.join(".srn/jobs")).unwrap();

        let adapter = FsTreeAdapter::new(root.to_path_buf(), StorageKind::VectorStore);
        assert_eq!(
            adapter.legacy_workspaces().await.unwrap(),
            vec![WS.to_string(), "legacy-docs".to_string()]
        );

        let item = StoredItem::new(json!({}));
        for (scope, key) in [
            ("user.john", "a"),
            ("user.john.proj_research", "b"),
            ("user.john.proj_research.thr_t1", "c"),
            ("agent.bot.proj_ops", "d"),
        ] {
            adapter.write(&address(scope, key), &item).await.unwrap();
        }

        let all = adapter.list_scopes(None).await.unwrap();
        assert_eq!(all.len(), 4);

        let research = adapter
            .list_scopes(Some(&format!("1.{}.user.john.proj_research*", WS)))
            .await
            .unwrap();
        let rendered: Vec<&str> = research.iter().map(|scope| scope.as_str()).collect();
        assert_eq!(
            rendered,
            vec![
                format!("1.{}.user.john.proj_research", WS),
                format!("1.{}.user.john.proj_research.thr_t1", WS),
            ]
        );
    }
}
