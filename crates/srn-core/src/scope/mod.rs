//! Scope domain module.
//!
//! # Module Structure
//!
//! - `model`: `Scope`, `ScopeFilter`, `ScopeField`, `ScopeRelation`
//! - `resolver`: `ScopeResolver` and `MergedScopeFilter`

mod model;
pub mod resolver;

pub use model::{Scope, ScopeField, ScopeFilter, ScopeRelation};
pub use resolver::{FieldConstraint, MergedScopeFilter, ScopeResolver};
