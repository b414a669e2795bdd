//! Storage adapter contract.
//!
//! Each concrete backend participates in scoping and migration by
//! implementing [`StorageAdapter`]. The scope to write under is always passed
//! explicitly inside the [`ItemAddress`]; adapters hold no ambient scope.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::kind::StorageKind;
use crate::addressing::{BackendFamily, ItemAddress, ScopeAddress};
use crate::error::Result;

/// Marks which migration job wrote a target item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub job_id: String,
    pub legacy_key: String,
}

/// An item as stored at a target address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl StoredItem {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            provenance: None,
        }
    }

    /// Item written by a migration job.
    pub fn migrated(payload: serde_json::Value, job_id: &str, legacy_key: &str) -> Self {
        Self {
            payload,
            provenance: Some(Provenance {
                job_id: job_id.to_string(),
                legacy_key: legacy_key.to_string(),
            }),
        }
    }

    /// Returns true if this item was written by `job_id`.
    pub fn written_by(&self, job_id: &str) -> bool {
        self.provenance
            .as_ref()
            .is_some_and(|provenance| provenance.job_id == job_id)
    }
}

/// One legacy workspace-addressed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyItem {
    pub key: String,
    pub payload: serde_json::Value,
}

/// One page of a legacy listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyPage {
    pub items: Vec<LegacyItem>,
    /// Token to pass back for the next page; `None` once exhausted.
    pub next_token: Option<String>,
}

/// Contract every backend implements.
///
/// Implementations must not assume transactionality across addresses.
/// Legacy listings are finite, ordered by key, and restartable: passing the
/// token returned with a page yields the items after that page.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Category of data this adapter owns.
    fn kind(&self) -> StorageKind;

    /// Addressing family the adapter understands.
    fn family(&self) -> BackendFamily;

    /// Lists legacy items of a workspace, starting after `resume_token`.
    async fn list_legacy(
        &self,
        workspace: &str,
        resume_token: Option<&str>,
        limit: usize,
    ) -> Result<LegacyPage>;

    /// Writes an item to a target address, overwriting any existing item.
    async fn write(&self, address: &ItemAddress, item: &StoredItem) -> Result<()>;

    /// Reads the item at a target address.
    async fn read(&self, address: &ItemAddress) -> Result<Option<StoredItem>>;

    /// Deletes the item at a target address. Deleting a missing item is not
    /// an error.
    async fn delete(&self, address: &ItemAddress) -> Result<()>;

    async fn exists(&self, address: &ItemAddress) -> Result<bool> {
        Ok(self.read(address).await?.is_some())
    }

    /// Returns true if any item is already stored directly under `address`.
    ///
    /// Items of narrower scopes do not count. Adapters that cannot answer
    /// cheaply keep the default.
    async fn has_target_items(&self, _address: &ScopeAddress) -> Result<bool> {
        Ok(false)
    }

    /// Legacy workspaces this adapter holds data for.
    async fn legacy_workspaces(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Counts legacy items by paging through the listing.
    async fn count_legacy(&self, workspace: &str) -> Result<u64> {
        let mut count = 0u64;
        let mut token: Option<String> = None;
        loop {
            let page = self.list_legacy(workspace, token.as_deref(), 500).await?;
            count += page.items.len() as u64;
            match page.next_token {
                Some(next) => token = Some(next),
                None => return Ok(count),
            }
        }
    }
}
