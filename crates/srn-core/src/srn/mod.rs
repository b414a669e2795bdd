//! Scope Resource Names.
//!
//! An SRN is a dotted, versioned identifier:
//! `1.<workspace>.<subject_type>.<subject_id>[.proj_<p>][.thr_<t>][.top_<t>]`.

mod components;
pub mod grammar;

pub use components::{SrnBuilder, SrnComponents, SubjectType};
pub use grammar::{canonicalize, is_valid, parse, serialize, validate, SRN_VERSION};
