//! Backend address derivation.
//!
//! Maps a [`Scope`] to the native addressing primitive of each backend family
//! and provides the partial-match predicate backends use when filtering.
//! Nothing in this module performs I/O.
//!
//! # Module Structure
//!
//! - `path`: hierarchical path segments
//! - `key`: composite keys for keyed/collection stores
//! - `columns`: equality predicates over scope columns
//! - `labels`: graph node label sets

pub mod columns;
pub mod key;
pub mod labels;
pub mod path;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::{Result, ScopeError};
use crate::scope::Scope;

pub use columns::ColumnPredicates;
pub use key::{CompositeKey, KEY_DELIMITER};
pub use labels::LabelSet;
pub use path::ScopePath;

/// Maximum item key length.
pub const MAX_ITEM_KEY_LEN: usize = 255;

/// Closed set of backend addressing families.
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
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackendFamily {
    HierarchicalPath,
    Keyed,
    Columnar,
    LabeledGraph,
}

/// A scope expressed in one backend family's native form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ScopeAddress {
    HierarchicalPath(ScopePath),
    Keyed(CompositeKey),
    Columnar(ColumnPredicates),
    LabeledGraph(LabelSet),
}

impl ScopeAddress {
    /// Derives the address of `scope` for `family`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentifier`/`InvalidWorkspace` if a component would
    /// be unsafe to embed in a native address.
    pub fn derive(scope: &Scope, family: BackendFamily) -> Result<Self> {
        let address = match family {
            BackendFamily::HierarchicalPath => Self::HierarchicalPath(ScopePath::from_scope(scope)?),
            BackendFamily::Keyed => Self::Keyed(CompositeKey::from_scope(scope)?),
            BackendFamily::Columnar => Self::Columnar(ColumnPredicates::from_scope(scope)),
            BackendFamily::LabeledGraph => Self::LabeledGraph(LabelSet::from_scope(scope)),
        };
        Ok(address)
    }

    /// Derives the address for every family, in family order.
    pub fn derive_all(scope: &Scope) -> Result<Vec<Self>> {
        use strum::IntoEnumIterator;
        BackendFamily::iter()
            .map(|family| Self::derive(scope, family))
            .collect()
    }

    pub fn family(&self) -> BackendFamily {
        match self {
            Self::HierarchicalPath(_) => BackendFamily::HierarchicalPath,
            Self::Keyed(_) => BackendFamily::Keyed,
            Self::Columnar(_) => BackendFamily::Columnar,
            Self::LabeledGraph(_) => BackendFamily::LabeledGraph,
        }
    }

    /// Recovers the scope this address was derived from.
    pub fn to_scope(&self) -> Result<Scope> {
        match self {
            Self::HierarchicalPath(path) => ScopePath::parse(path.segments()),
            Self::Keyed(key) => CompositeKey::parse(key.as_str()),
            Self::Columnar(columns) => columns.to_scope(),
            Self::LabeledGraph(labels) => labels.to_scope(),
        }
    }

    /// Recovers a scope from hierarchical path segments.
    pub fn parse_path<S: AsRef<str>>(segments: &[S]) -> Result<Scope> {
        ScopePath::parse(segments)
    }

    /// Address of a single item stored under this scope.
    pub fn item(&self, key: &str) -> Result<ItemAddress> {
        validate_item_key(key)?;
        Ok(ItemAddress {
            address: self.clone(),
            key: key.to_string(),
        })
    }

    /// Partial-match predicate: true if `item` lives under this scope's
    /// address in the same family.
    ///
    /// Every family agrees with [`Scope::is_parent_of`]: levels the scope
    /// omits match any value, including when a deeper level is fixed.
    pub fn covers(&self, item: &ItemAddress) -> bool {
        match (self, &item.address) {
            (Self::HierarchicalPath(scope), Self::HierarchicalPath(other)) => {
                scope.contains(other)
            }
            (Self::Keyed(scope), Self::Keyed(other)) => scope.contains(other.as_str()),
            (Self::Columnar(scope), Self::Columnar(other)) => scope.is_subset_of(other),
            (Self::LabeledGraph(scope), Self::LabeledGraph(other)) => scope.is_subset_of(other),
            _ => false,
        }
    }

    /// Human-readable native rendering.
    pub fn render(&self) -> String {
        match self {
            Self::HierarchicalPath(path) => path.join(),
            Self::Keyed(key) => key.to_string(),
            Self::Columnar(columns) => columns.render(),
            Self::LabeledGraph(labels) => labels.labels().collect::<Vec<_>>().join(":"),
        }
    }
}

impl std::fmt::Display for ScopeAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Address of one stored item: the scope address plus the item key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemAddress {
    address: ScopeAddress,
    key: String,
}

impl ItemAddress {
    pub fn scope_address(&self) -> &ScopeAddress {
        &self.address
    }

    pub fn family(&self) -> BackendFamily {
        self.address.family()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn scope(&self) -> Result<Scope> {
        self.address.to_scope()
    }

    /// Native rendering of the item location.
    pub fn render(&self) -> String {
        match &self.address {
            ScopeAddress::HierarchicalPath(path) => format!("{}/{}", path.join(), self.key),
            ScopeAddress::Keyed(key) => format!("{}{}{}", key, KEY_DELIMITER, self.key),
            other => format!("{}#{}", other.render(), self.key),
        }
    }
}

impl std::fmt::Display for ItemAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Validates an item key for use inside any native address.
pub fn validate_item_key(key: &str) -> Result<()> {
    let reason = if key.is_empty() {
        Some("cannot be empty".to_string())
    } else if key.chars().count() > MAX_ITEM_KEY_LEN {
        Some(format!("exceeds maximum length of {} characters", MAX_ITEM_KEY_LEN))
    } else if key.contains(['/', '\\', KEY_DELIMITER, '\0']) {
        Some("cannot contain path separators, ':' or NUL".to_string())
    } else if key == "." || key == ".." {
        Some("cannot be a relative path component".to_string())
    } else {
        None
    };

    match reason {
        Some(message) => Err(ScopeError::invalid_identifier("item_key", key, message)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;
    use strum::IntoEnumIterator;

    const WS: &str = "abc12345abcd12345abc1234567890ab";

    fn scope(suffix: &str) -> Scope {
        Scope::from_string(&format!("1.{}.user.john{}", WS, suffix)).unwrap()
    }

    #[test]
    fn test_every_family_round_trips() {
        let scope = scope(".proj_research.thr_t1");
        for address in ScopeAddress::derive_all(&scope).unwrap() {
            assert_eq!(address.to_scope().unwrap(), scope, "{}", address.family());
        }
    }

    #[test]
    fn test_item_addresses() {
        let address = ScopeAddress::derive(&scope(".proj_p"), BackendFamily::Keyed).unwrap();
        let item = address.item("doc-1").unwrap();
        assert_eq!(item.render(), format!("{}:user:john:proj_p:doc-1", WS));
        assert_eq!(item.key(), "doc-1");
        assert_eq!(item.scope().unwrap(), scope(".proj_p"));

        for bad in ["", "..", ".", "a/b", "a:b", "a\\b"] {
            let err = address.item(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);
            assert_eq!(err.segment(), Some(bad));
        }
        assert!(address.item(&"k".repeat(256)).is_err());
        assert!(address.item(&"k".repeat(255)).is_ok());
    }

    #[test]
    fn test_covers_per_family() {
        let base = scope("");
        let narrow = scope(".proj_research");
        for family in BackendFamily::iter() {
            let base_addr = ScopeAddress::derive(&base, family).unwrap();
            let narrow_addr = ScopeAddress::derive(&narrow, family).unwrap();
            let item = narrow_addr.item("x").unwrap();
            assert!(base_addr.covers(&item), "{}", family);
            assert!(narrow_addr.covers(&item), "{}", family);

            let base_item = base_addr.item("x").unwrap();
            assert!(!narrow_addr.covers(&base_item), "{}", family);
        }

        let keyed = ScopeAddress::derive(&base, BackendFamily::Keyed).unwrap();
        let path_item = ScopeAddress::derive(&base, BackendFamily::HierarchicalPath)
            .unwrap()
            .item("x")
            .unwrap();
        assert!(!keyed.covers(&path_item));
    }

    #[test]
    fn test_thread_scope_covers_project_thread_items() {
        let thread_only = scope(".thr_x");
        let nested = scope(".proj_a.thr_x");
        let sibling = scope(".proj_a.thr_y");
        assert!(thread_only.is_parent_of(&nested));

        for family in BackendFamily::iter() {
            let parent = ScopeAddress::derive(&thread_only, family).unwrap();
            let item = ScopeAddress::derive(&nested, family)
                .unwrap()
                .item("doc")
                .unwrap();
            let sibling_item = ScopeAddress::derive(&sibling, family)
                .unwrap()
                .item("doc")
                .unwrap();
            assert!(parent.covers(&item), "{}", family);
            assert!(!parent.covers(&sibling_item), "{}", family);
        }
    }

    #[test]
    fn test_serde_tagged() {
        let address = ScopeAddress::derive(&scope(""), BackendFamily::Keyed).unwrap();
        let json = serde_json::to_value(&address).unwrap();
        assert_eq!(json["family"], "keyed");
        let back: ScopeAddress = serde_json::from_value(json).unwrap();
        assert_eq!(back, address);
    }

    fn arb_scope() -> impl Strategy<Value = Scope> {
        let level = proptest::option::of("[a-c_]{1,3}");
        (
            prop_oneof![Just("user"), Just("agent")],
            "[a-c_-]{1,3}",
            level.clone(),
            level.clone(),
            level,
        )
            .prop_map(|(subject_type, id, p, t, o)| {
                let mut raw = format!("1.{}.{}.{}", WS, subject_type, id);
                if let Some(p) = p {
                    raw.push_str(&format!(".proj_{}", p));
                }
                if let Some(t) = t {
                    raw.push_str(&format!(".thr_{}", t));
                }
                if let Some(o) = o {
                    raw.push_str(&format!(".top_{}", o));
                }
                Scope::from_string(&raw).unwrap()
            })
    }

    proptest! {
        #[test]
        fn prop_derivation_is_injective(a in arb_scope(), b in arb_scope()) {
            prop_assume!(a != b);
            for family in BackendFamily::iter() {
                let left = ScopeAddress::derive(&a, family).unwrap();
                let right = ScopeAddress::derive(&b, family).unwrap();
                prop_assert_ne!(left.render(), right.render());
                prop_assert_ne!(left, right);
            }
        }

        #[test]
        fn prop_covers_agrees_with_is_parent_of(a in arb_scope(), b in arb_scope()) {
            let expected = a.is_parent_of(&b);
            for family in BackendFamily::iter() {
                let parent = ScopeAddress::derive(&a, family).unwrap();
                let item = ScopeAddress::derive(&b, family).unwrap().item("k").unwrap();
                prop_assert_eq!(parent.covers(&item), expected, "{}", family);
            }
        }
    }
}
