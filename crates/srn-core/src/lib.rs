pub mod addressing;
pub mod error;
pub mod migration;
pub mod scope;
pub mod srn;

// Re-export common types
pub use addressing::{BackendFamily, ItemAddress, ScopeAddress};
pub use error::{ErrorKind, Result, ScopeError};
pub use scope::{Scope, ScopeFilter, ScopeResolver};
pub use srn::{SrnComponents, SubjectType};
