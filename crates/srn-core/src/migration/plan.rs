//! Discovery inventory and migration planning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::kind::{StorageKind, Throughput};
use crate::addressing::{BackendFamily, ScopeAddress};
use crate::error::{Result, ScopeError};
use crate::scope::{Scope, ScopeResolver};

/// Inventories above this size get a batching warning.
pub const LARGE_DATASET_THRESHOLD: u64 = 10_000;

/// Legacy items found for one source workspace, counted per storage kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub source_workspace: String,
    pub counts: BTreeMap<StorageKind, u64>,
    pub discovered_at: DateTime<Utc>,
}

impl Inventory {
    pub fn new(source_workspace: impl Into<String>) -> Self {
        Self {
            source_workspace: source_workspace.into(),
            counts: BTreeMap::new(),
            discovered_at: Utc::now(),
        }
    }

    /// Adds `count` items to a kind.
    pub fn record(&mut self, kind: StorageKind, count: u64) {
        *self.counts.entry(kind).or_insert(0) += count;
    }

    pub fn count(&self, kind: StorageKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_items(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_items() == 0
    }
}

/// Immutable result of planning. Discarding a plan has no side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub source_workspace: String,
    pub target: Scope,
    pub estimated_items: BTreeMap<StorageKind, u64>,
    pub storage_kinds: Vec<StorageKind>,
    pub estimated_duration_ms: u64,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl MigrationPlan {
    /// Builds a plan from an inventory.
    ///
    /// Pure: only the inventory and target are inspected.
    ///
    /// # Errors
    ///
    /// Returns `MigrationValidation` if the source workspace is empty, the
    /// target cannot be addressed in some backend family, or the target
    /// equals the scope the legacy workspace already implies.
    pub fn build(
        inventory: &Inventory,
        target: &Scope,
        resolver: &ScopeResolver,
        throughput: &Throughput,
    ) -> Result<Self> {
        let source = inventory.source_workspace.as_str();
        if source.trim().is_empty() {
            return Err(ScopeError::validation("source workspace cannot be empty"));
        }

        for family in [
            BackendFamily::HierarchicalPath,
            BackendFamily::Keyed,
            BackendFamily::Columnar,
            BackendFamily::LabeledGraph,
        ] {
            ScopeAddress::derive(target, family).map_err(|e| {
                ScopeError::validation(format!("target scope '{}' is malformed: {}", target, e))
            })?;
        }

        let mut warnings = Vec::new();
        match resolver.from_legacy_workspace(source) {
            Ok(implied) if &implied == target => {
                return Err(ScopeError::validation(format!(
                    "target scope '{}' is identical to the scope implied by workspace '{}'",
                    target, source
                )));
            }
            Ok(_) => {}
            Err(_) => warnings.push(format!(
                "workspace '{}' is not a 32-character hex identifier; consider a UUID-based workspace",
                source
            )),
        }

        let storage_kinds: Vec<StorageKind> = inventory
            .counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(kind, _)| *kind)
            .collect();
        let estimated_items: BTreeMap<StorageKind, u64> = storage_kinds
            .iter()
            .map(|kind| (*kind, inventory.count(*kind)))
            .collect();

        let total = inventory.total_items();
        if total == 0 {
            warnings.push(format!("no legacy items found in workspace '{}'", source));
        } else if total > LARGE_DATASET_THRESHOLD {
            warnings.push(format!(
                "large dataset ({} items); consider migrating in batches",
                total
            ));
        }

        let estimated_secs: f64 = estimated_items
            .iter()
            .map(|(kind, count)| throughput.estimate_secs(*kind, *count))
            .sum();

        Ok(Self {
            source_workspace: source.to_string(),
            target: target.clone(),
            estimated_items,
            storage_kinds,
            estimated_duration_ms: (estimated_secs * 1000.0).ceil() as u64,
            warnings,
        })
    }

    pub fn estimated_total(&self) -> u64 {
        self.estimated_items.values().sum()
    }

    pub fn estimated_duration(&self) -> Duration {
        Duration::from_millis(self.estimated_duration_ms)
    }
}
