//! JSON key-value file adapter (keyed family).
//!
//! ```text
//! <root>/<workspace>/<kind>_<namespace>.json   # legacy: { "<key>": <value>, ... }
//! <root>/scoped/<kind>_<namespace>.json        # migrated: { "<composite>:<key>": StoredItem, ... }
//! ```
//!
//! A legacy item key is `<namespace>.<key>`, so one workspace listing spans
//! every namespace file in key order.

use async_trait::async_trait;
use srn_core::addressing::{BackendFamily, ItemAddress, KEY_DELIMITER, ScopeAddress};
use srn_core::error::{Result, ScopeError};
use srn_core::migration::{LegacyItem, LegacyPage, StorageAdapter, StorageKind, StoredItem};
use std::collections::BTreeMap;
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use tokio::task;

use crate::storage::AtomicFile;

/// Directory under the root holding migrated namespace files.
pub const SCOPED_DIR: &str = "scoped";

/// Namespace used for item keys without a `<namespace>.` prefix.
const DEFAULT_NAMESPACE: &str = "default";

type LegacyMap = BTreeMap<String, serde_json::Value>;
type ScopedMap = BTreeMap<String, StoredItem>;

/// Keyed adapter over per-namespace JSON object files.
#[derive(Debug, Clone)]
pub struct JsonKvFileAdapter {
    root: PathBuf,
    kind: StorageKind,
}

impl JsonKvFileAdapter {
    pub fn new(root: PathBuf, kind: StorageKind) -> Self {
        Self { root, kind }
    }

    fn file_prefix(kind: StorageKind) -> String {
        format!("{}_", kind.as_str())
    }

    /// Namespace of a `<kind>_<namespace>.json` file name.
    fn namespace_of(kind: StorageKind, file_name: &str) -> Option<String> {
        let namespace = file_name
            .strip_prefix(&Self::file_prefix(kind))?
            .strip_suffix(".json")?;
        (!namespace.is_empty()).then(|| namespace.to_string())
    }

    /// Splits an item key into namespace and inner key.
    fn split_key(key: &str) -> (&str, &str) {
        match key.split_once('.') {
            Some((namespace, inner)) if !namespace.is_empty() && !inner.is_empty() => {
                (namespace, inner)
            }
            _ => (DEFAULT_NAMESPACE, key),
        }
    }

    /// Namespace file and entry key for a target address.
    fn target_location(&self, address: &ItemAddress) -> Result<(PathBuf, String)> {
        let ScopeAddress::Keyed(composite) = address.scope_address() else {
            return Err(ScopeError::storage(format!(
                "{} adapter cannot address {} item '{}'",
                BackendFamily::Keyed,
                address.family(),
                address
            )));
        };
        let (namespace, inner) = Self::split_key(address.key());
        let file = self
            .root
            .join(SCOPED_DIR)
            .join(format!("{}{}.json", Self::file_prefix(self.kind), namespace));
        Ok((file, format!("{}{}{}", composite, KEY_DELIMITER, inner)))
    }

    fn spawn_error(e: task::JoinError) -> ScopeError {
        ScopeError::io(format!("Failed to spawn blocking task: {}", e))
    }

    /// Every legacy item of a workspace, keyed `<namespace>.<key>`.
    fn load_legacy_sync(dir: &Path, kind: StorageKind) -> Result<LegacyMap> {
        let mut merged = LegacyMap::new();
        if !dir.is_dir() {
            return Ok(merged);
        }
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                tracing::warn!(path = %path.display(), "Skipping entry with non-UTF-8 name");
                continue;
            };
            let Some(namespace) = Self::namespace_of(kind, name) else {
                continue;
            };
            if let Some(items) = AtomicFile::<LegacyMap>::json(path).load()? {
                for (key, value) in items {
                    merged.insert(format!("{}.{}", namespace, key), value);
                }
            }
        }
        Ok(merged)
    }

    /// Returns true if any scoped namespace file holds an entry directly
    /// under `composite`.
    fn has_scoped_items_sync(dir: &Path, kind: StorageKind, composite: &str) -> Result<bool> {
        if !dir.is_dir() {
            return Ok(false);
        }
        let prefix = format!("{}{}", composite, KEY_DELIMITER);
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                tracing::warn!(path = %path.display(), "Skipping entry with non-UTF-8 name");
                continue;
            };
            if Self::namespace_of(kind, name).is_none() {
                continue;
            }
            let Some(items) = AtomicFile::<ScopedMap>::json(path).load()? else {
                continue;
            };
            let direct = items.keys().any(|entry| {
                entry
                    .strip_prefix(&prefix)
                    .is_some_and(|inner| !inner.contains(KEY_DELIMITER))
            });
            if direct {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn legacy_workspaces_sync(root: &Path, kind: StorageKind) -> Result<Vec<String>> {
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let mut workspaces = Vec::new();
        for entry in fs::read_dir(root)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !path.is_dir() || name.starts_with('.') || name == SCOPED_DIR {
                continue;
            }
            let mut has_namespace = false;
            for file in fs::read_dir(&path)? {
                if let Some(file_name) = file?.file_name().to_str() {
                    if Self::namespace_of(kind, file_name).is_some() {
                        has_namespace = true;
                        break;
                    }
                }
            }
            if has_namespace {
                workspaces.push(name.to_string());
            }
        }
        workspaces.sort();
        Ok(workspaces)
    }
}

#[async_trait]
impl StorageAdapter for JsonKvFileAdapter {
    fn kind(&self) -> StorageKind {
        self.kind
    }

    fn family(&self) -> BackendFamily {
        BackendFamily::Keyed
    }

    async fn list_legacy(
        &self,
        workspace: &str,
        resume_token: Option<&str>,
        limit: usize,
    ) -> Result<LegacyPage> {
        if workspace.is_empty()
            || workspace.contains(['/', '\\', '\0'])
            || workspace.starts_with('.')
            || workspace == SCOPED_DIR
        {
            return Err(ScopeError::storage(format!(
                "'{}' is not a usable workspace directory name",
                workspace
            )));
        }
        let dir = self.root.join(workspace);
        let kind = self.kind;
        let resume_token = resume_token.map(str::to_string);

        task::spawn_blocking(move || {
            let legacy = Self::load_legacy_sync(&dir, kind)?;
            let lower = match resume_token {
                Some(token) => Bound::Excluded(token),
                None => Bound::Unbounded,
            };
            let mut items: Vec<LegacyItem> = legacy
                .range((lower, Bound::Unbounded))
                .take(limit.saturating_add(1))
                .map(|(key, payload)| LegacyItem {
                    key: key.clone(),
                    payload: payload.clone(),
                })
                .collect();

            let next_token = if items.len() > limit {
                items.truncate(limit);
                items.last().map(|item| item.key.clone())
            } else {
                None
            };
            Ok(LegacyPage { items, next_token })
        })
        .await
        .map_err(Self::spawn_error)?
    }

    async fn write(&self, address: &ItemAddress, item: &StoredItem) -> Result<()> {
        let (file, entry) = self.target_location(address)?;
        let item = item.clone();

        task::spawn_blocking(move || {
            AtomicFile::<ScopedMap>::json(file).update(ScopedMap::new(), |map| {
                map.insert(entry, item);
                Ok(())
            })
        })
        .await
        .map_err(Self::spawn_error)?
    }

    async fn read(&self, address: &ItemAddress) -> Result<Option<StoredItem>> {
        let (file, entry) = self.target_location(address)?;

        task::spawn_blocking(move || {
            Ok(AtomicFile::<ScopedMap>::json(file)
                .load()?
                .and_then(|mut map| map.remove(&entry)))
        })
        .await
        .map_err(Self::spawn_error)?
    }

    async fn delete(&self, address: &ItemAddress) -> Result<()> {
        let (file, entry) = self.target_location(address)?;

        task::spawn_blocking(move || {
            let scoped = AtomicFile::<ScopedMap>::json(file);
            if !scoped.path().exists() {
                return Ok(());
            }
            scoped.update(ScopedMap::new(), |map| {
                map.remove(&entry);
                Ok(())
            })
        })
        .await
        .map_err(Self::spawn_error)?
    }

    async fn has_target_items(&self, address: &ScopeAddress) -> Result<bool> {
        let ScopeAddress::Keyed(composite) = address else {
            return Err(ScopeError::storage(format!(
                "{} adapter cannot address {} scope '{}'",
                BackendFamily::Keyed,
                address.family(),
                address
            )));
        };
        let dir = self.root.join(SCOPED_DIR);
        let kind = self.kind;
        let composite = composite.as_str().to_string();

        task::spawn_blocking(move || Self::has_scoped_items_sync(&dir, kind, &composite))
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
    use srn_core::scope::Scope;

    const WS: &str = "abc12345abcd12345abc1234567890ab";

    fn seed(root: &Path, workspace: &str, file: &str, content: serde_json::Value) {
        let dir = root.join(workspace);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), content.to_string()).unwrap();
    }

    fn address(scope: &str, key: &str) -> ItemAddress {
        let scope = Scope::from_string(&format!("1.{}.{}", WS, scope)).unwrap();
        ScopeAddress::derive(&scope, BackendFamily::Keyed)
            .unwrap()
            .item(key)
            .unwrap()
    }

    #[tokio::test]
    async fn test_legacy_listing_spans_namespaces() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        seed(root, WS, "kv_store_llm_cache.json", json!({ "q2": 2, "q1": 1 }));
        seed(root, WS, "kv_store_docs.json", json!({ "d1": { "text": "x" } }));
        seed(root, WS, "doc_status_docs.json", json!({ "d1": "processed" }));

        let adapter = JsonKvFileAdapter::new(root.to_path_buf(), StorageKind::KvStore);
        let first = adapter.list_legacy(WS, None, 2).await.unwrap();
        let keys: Vec<&str> = first.items.iter().map(|item| item.key.as_str()).collect();
        assert_eq!(keys, vec!["docs.d1", "llm_cache.q1"]);
        assert_eq!(first.next_token.as_deref(), Some("llm_cache.q1"));

        let second = adapter
            .list_legacy(WS, first.next_token.as_deref(), 2)
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].payload, json!(2));
        assert!(second.next_token.is_none());

        let status = JsonKvFileAdapter::new(root.to_path_buf(), StorageKind::DocStatus);
        assert_eq!(status.count_legacy(WS).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scoped_writes_share_namespace_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let adapter = JsonKvFileAdapter::new(temp_dir.path().to_path_buf(), StorageKind::KvStore);

        let a = address("user.john", "docs.d1");
        let b = address("user.john.proj_research", "docs.d1");
        let item_a = StoredItem::migrated(json!("a"), "job-1", "docs.d1");
        let item_b = StoredItem::new(json!("b"));
        adapter.write(&a, &item_a).await.unwrap();
        adapter.write(&b, &item_b).await.unwrap();

        let file = temp_dir.path().join("scoped/kv_store_docs.json");
        let stored: ScopedMap =
            serde_json::from_str(&fs::read_to_string(&file).unwrap()).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.contains_key(&format!("{}:user:john:d1", WS)));

        assert_eq!(adapter.read(&a).await.unwrap(), Some(item_a));
        adapter.delete(&a).await.unwrap();
        assert!(adapter.read(&a).await.unwrap().is_none());
        assert_eq!(adapter.read(&b).await.unwrap(), Some(item_b));

        // deleting from a namespace file that was never written
        adapter.delete(&address("user.john", "other.x")).await.unwrap();
        assert!(!temp_dir.path().join("scoped/kv_store_other.json").exists());
    }

    #[tokio::test]
    async fn test_has_target_items_ignores_narrower_scopes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let adapter = JsonKvFileAdapter::new(temp_dir.path().to_path_buf(), StorageKind::KvStore);
        let base = address("user.john", "docs.d1");
        let project = address("user.john.proj_research", "docs.d1");
        assert!(!adapter.has_target_items(base.scope_address()).await.unwrap());

        adapter.write(&project, &StoredItem::new(json!(1))).await.unwrap();
        assert!(!adapter.has_target_items(base.scope_address()).await.unwrap());
        assert!(adapter.has_target_items(project.scope_address()).await.unwrap());

        adapter.write(&base, &StoredItem::new(json!(2))).await.unwrap();
        assert!(adapter.has_target_items(base.scope_address()).await.unwrap());
    }

    #[tokio::test]
    async fn test_legacy_workspaces() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        seed(root, WS, "kv_store_docs.json", json!({}));
        seed(root, "other", "doc_status_docs.json", json!({}));
        let adapter = JsonKvFileAdapter::new(root.to_path_buf(), StorageKind::KvStore);
        adapter
            .write(&address("user.john", "docs.d1"), &StoredItem::new(json!(1)))
            .await
            .unwrap();

        assert_eq!(adapter.legacy_workspaces().await.unwrap(), vec![WS.to_string()]);
    }

    #[test]
    fn test_split_key() {
        assert_eq!(JsonKvFileAdapter::split_key("ns.k.v"), ("ns", "k.v"));
        assert_eq!(JsonKvFileAdapter::split_key("plain"), ("default", "plain"));
        assert_eq!(JsonKvFileAdapter::split_key(".hidden"), ("default", ".hidden"));
    }
}
