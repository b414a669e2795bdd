//! Storage kinds and migration throughput constants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Category of legacy data a backend adapter owns.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StorageKind {
    KvStore,
    VectorStore,
    GraphStore,
    DocStatus,
}

impl StorageKind {
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    /// Items migrated per second when no override is configured.
    pub fn default_throughput(&self) -> f64 {
        match self {
            Self::KvStore => 500.0,
            Self::VectorStore => 100.0,
            Self::GraphStore => 200.0,
            Self::DocStatus => 1000.0,
        }
    }
}

/// Throughput per storage kind used for duration estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Throughput {
    rates: BTreeMap<StorageKind, f64>,
}

impl Default for Throughput {
    fn default() -> Self {
        Self {
            rates: StorageKind::iter()
                .map(|kind| (kind, kind.default_throughput()))
                .collect(),
        }
    }
}

impl Throughput {
    /// Overrides the rate for one kind. Non-positive rates are ignored.
    pub fn with_rate(mut self, kind: StorageKind, items_per_second: f64) -> Self {
        if items_per_second > 0.0 && items_per_second.is_finite() {
            self.rates.insert(kind, items_per_second);
        }
        self
    }

    pub fn rate(&self, kind: StorageKind) -> f64 {
        self.rates
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_throughput())
    }

    /// Estimated seconds to migrate `items` of `kind`.
    pub fn estimate_secs(&self, kind: StorageKind, items: u64) -> f64 {
        items as f64 / self.rate(kind)
    }
}
