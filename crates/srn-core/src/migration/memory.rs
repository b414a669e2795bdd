//! In-memory storage adapter.
//!
//! Holds legacy items per workspace and migrated items per target address.
//! Used by tests and dry environments; supports snapshots for before/after
//! comparisons and injected write failures.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use tokio::sync::RwLock;

use super::adapter::{LegacyItem, LegacyPage, StorageAdapter, StoredItem};
use super::kind::StorageKind;
use crate::addressing::{BackendFamily, ItemAddress, ScopeAddress};
use crate::error::{Result, ScopeError};

/// Complete state of a [`MemoryAdapter`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySnapshot {
    pub legacy: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    pub targets: BTreeMap<ItemAddress, StoredItem>,
}

#[derive(Debug)]
pub struct MemoryAdapter {
    kind: StorageKind,
    family: BackendFamily,
    state: RwLock<MemorySnapshot>,
    failing_keys: RwLock<BTreeSet<String>>,
}

impl MemoryAdapter {
    pub fn new(kind: StorageKind, family: BackendFamily) -> Self {
        Self {
            kind,
            family,
            state: RwLock::new(MemorySnapshot::default()),
            failing_keys: RwLock::new(BTreeSet::new()),
        }
    }

    /// Seeds one legacy item.
    pub async fn insert_legacy(&self, workspace: &str, key: &str, payload: serde_json::Value) {
        self.state
            .write()
            .await
            .legacy
            .entry(workspace.to_string())
            .or_default()
            .insert(key.to_string(), payload);
    }

    /// Seeds a target item directly, bypassing migration.
    pub async fn insert_target(&self, address: ItemAddress, item: StoredItem) {
        self.state.write().await.targets.insert(address, item);
    }

    /// Removes a legacy item, as if it vanished from the source.
    pub async fn remove_legacy(&self, workspace: &str, key: &str) {
        if let Some(items) = self.state.write().await.legacy.get_mut(workspace) {
            items.remove(key);
        }
    }

    /// Makes writes of items migrated from `legacy_key` fail until healed.
    pub async fn fail_writes_for(&self, legacy_key: &str) {
        self.failing_keys.write().await.insert(legacy_key.to_string());
    }

    /// Clears every injected failure.
    pub async fn heal(&self) {
        self.failing_keys.write().await.clear();
    }

    pub async fn snapshot(&self) -> MemorySnapshot {
        self.state.read().await.clone()
    }

    pub async fn target_count(&self) -> usize {
        self.state.read().await.targets.len()
    }

    pub async fn legacy_count(&self, workspace: &str) -> usize {
        self.state
            .read()
            .await
            .legacy
            .get(workspace)
            .map_or(0, BTreeMap::len)
    }

    fn check_family(&self, address: &ItemAddress) -> Result<()> {
        if address.family() != self.family {
            return Err(ScopeError::storage(format!(
                "{} adapter cannot address {} item '{}'",
                self.family,
                address.family(),
                address
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    fn kind(&self) -> StorageKind {
        self.kind
    }

    fn family(&self) -> BackendFamily {
        self.family
    }

    async fn list_legacy(
        &self,
        workspace: &str,
        resume_token: Option<&str>,
        limit: usize,
    ) -> Result<LegacyPage> {
        let state = self.state.read().await;
        let Some(items) = state.legacy.get(workspace) else {
            return Ok(LegacyPage::default());
        };

        let lower = match resume_token {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Unbounded,
        };
        let mut page: Vec<LegacyItem> = items
            .range((lower, Bound::Unbounded))
            .take(limit.saturating_add(1))
            .map(|(key, payload)| LegacyItem {
                key: key.clone(),
                payload: payload.clone(),
            })
            .collect();

        let next_token = if page.len() > limit {
            page.truncate(limit);
            page.last().map(|item| item.key.clone())
        } else {
            None
        };
        Ok(LegacyPage {
            items: page,
            next_token,
        })
    }

    async fn write(&self, address: &ItemAddress, item: &StoredItem) -> Result<()> {
        self.check_family(address)?;
        if let Some(provenance) = &item.provenance {
            if self.failing_keys.read().await.contains(&provenance.legacy_key) {
                return Err(ScopeError::storage(format!(
                    "injected write failure for '{}'",
                    provenance.legacy_key
                )));
            }
        }
        self.state
            .write()
            .await
            .targets
            .insert(address.clone(), item.clone());
        Ok(())
    }

    async fn read(&self, address: &ItemAddress) -> Result<Option<StoredItem>> {
        self.check_family(address)?;
        Ok(self.state.read().await.targets.get(address).cloned())
    }

    async fn delete(&self, address: &ItemAddress) -> Result<()> {
        self.check_family(address)?;
        self.state.write().await.targets.remove(address);
        Ok(())
    }

    async fn has_target_items(&self, address: &ScopeAddress) -> Result<bool> {
        if address.family() != self.family {
            return Err(ScopeError::storage(format!(
                "{} adapter cannot address {} scope '{}'",
                self.family,
                address.family(),
                address
            )));
        }
        Ok(self
            .state
            .read()
            .await
            .targets
            .keys()
            .any(|item| item.scope_address() == address))
    }

    async fn legacy_workspaces(&self) -> Result<Vec<String>> {
        Ok(self.state.read().await.legacy.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::ScopeAddress;
    use crate::scope::Scope;
    use serde_json::json;

    const WS: &str = "abc12345abcd12345abc1234567890ab";

    #[tokio::test]
    async fn test_listing_pages_are_restartable() {
        let adapter = MemoryAdapter::new(StorageKind::KvStore, BackendFamily::Keyed);
        for key in ["c", "a", "b"] {
            adapter.insert_legacy(WS, key, json!({ "k": key })).await;
        }

        let first = adapter.list_legacy(WS, None, 2).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.items[0].key, "a");
        assert_eq!(first.next_token.as_deref(), Some("b"));

        let second = adapter
            .list_legacy(WS, first.next_token.as_deref(), 2)
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].key, "c");
        assert!(second.next_token.is_none());

        assert_eq!(adapter.count_legacy(WS).await.unwrap(), 3);
        assert_eq!(adapter.count_legacy("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let adapter = MemoryAdapter::new(StorageKind::KvStore, BackendFamily::Keyed);
        let scope = Scope::from_string(&format!("1.{}.user.john", WS)).unwrap();
        let address = ScopeAddress::derive(&scope, BackendFamily::Keyed)
            .unwrap()
            .item("doc")
            .unwrap();

        let item = StoredItem::migrated(json!(1), "job-1", "doc");
        adapter.write(&address, &item).await.unwrap();
        assert!(adapter.exists(&address).await.unwrap());
        assert!(adapter.read(&address).await.unwrap().unwrap().written_by("job-1"));

        adapter.delete(&address).await.unwrap();
        adapter.delete(&address).await.unwrap();
        assert!(!adapter.exists(&address).await.unwrap());

        let wrong_family = ScopeAddress::derive(&scope, BackendFamily::HierarchicalPath)
            .unwrap()
            .item("doc")
            .unwrap();
        assert!(adapter.write(&wrong_family, &item).await.is_err());
    }

    #[tokio::test]
    async fn test_has_target_items_matches_exact_scope() {
        let adapter = MemoryAdapter::new(StorageKind::DocStatus, BackendFamily::Keyed);
        let base = Scope::from_string(&format!("1.{}.user.john", WS)).unwrap();
        let project = base.with_project("p").unwrap();
        let base_addr = ScopeAddress::derive(&base, BackendFamily::Keyed).unwrap();
        let project_addr = ScopeAddress::derive(&project, BackendFamily::Keyed).unwrap();

        assert!(!adapter.has_target_items(&base_addr).await.unwrap());
        adapter
            .insert_target(project_addr.item("doc").unwrap(), StoredItem::new(json!(1)))
            .await;
        assert!(adapter.has_target_items(&project_addr).await.unwrap());
        assert!(!adapter.has_target_items(&base_addr).await.unwrap());

        let wrong_family = ScopeAddress::derive(&base, BackendFamily::Columnar).unwrap();
        assert!(adapter.has_target_items(&wrong_family).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_legacy() {
        let adapter = MemoryAdapter::new(StorageKind::KvStore, BackendFamily::Keyed);
        adapter.insert_legacy(WS, "a", json!(1)).await;
        adapter.insert_legacy(WS, "b", json!(2)).await;
        adapter.remove_legacy(WS, "a").await;
        adapter.remove_legacy("missing", "a").await;
        assert_eq!(adapter.legacy_count(WS).await, 1);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let adapter = MemoryAdapter::new(StorageKind::GraphStore, BackendFamily::LabeledGraph);
        let scope = Scope::from_string(&format!("1.{}.user.john", WS)).unwrap();
        let address = ScopeAddress::derive(&scope, BackendFamily::LabeledGraph)
            .unwrap()
            .item("n1")
            .unwrap();
        adapter.fail_writes_for("n1").await;
        let item = StoredItem::migrated(json!({}), "job", "n1");
        assert!(adapter.write(&address, &item).await.is_err());
        adapter.heal().await;
        assert!(adapter.write(&address, &item).await.is_ok());
    }
}
