//! Hierarchical path addressing (file trees, object stores).

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScopeError};
use crate::scope::Scope;
use crate::srn::grammar::{self, PROJECT_PREFIX, THREAD_PREFIX, TOPIC_PREFIX};

/// Ordered path segments:
/// `workspace / subject_type / subject_id [/ proj_<p>] [/ thr_<t>] [/ top_<t>]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopePath {
    segments: Vec<String>,
}

impl ScopePath {
    /// Derives the path for a scope, re-validating every segment.
    pub fn from_scope(scope: &Scope) -> Result<Self> {
        check_segment("workspace", scope.workspace())?;
        grammar::validate_workspace(scope.workspace())?;
        check_segment("subject_id", scope.subject_id())?;
        grammar::validate_identifier("subject_id", scope.subject_id())?;

        let mut segments = vec![
            scope.workspace().to_string(),
            scope.subject_type().to_string(),
            scope.subject_id().to_string(),
        ];
        for (field, prefix, value) in [
            ("project", PROJECT_PREFIX, scope.project()),
            ("thread", THREAD_PREFIX, scope.thread()),
            ("topic", TOPIC_PREFIX, scope.topic()),
        ] {
            if let Some(value) = value {
                check_segment(field, value)?;
                grammar::validate_identifier(field, value)?;
                segments.push(format!("{}{}", prefix, value));
            }
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Segments joined with `/`.
    pub fn join(&self) -> String {
        self.segments.join("/")
    }

    /// Returns true if every level `self` names appears unchanged in `other`.
    ///
    /// Omitted levels match anything, so `ws/user/alice/thr_x` contains
    /// `ws/user/alice/proj_a/thr_x`.
    pub fn contains(&self, other: &ScopePath) -> bool {
        let parent: Vec<&str> = self.segments.iter().map(String::as_str).collect();
        let child: Vec<&str> = other.segments.iter().map(String::as_str).collect();
        segments_contain(&parent, &child)
    }

    /// Recovers the scope from stored path segments.
    ///
    /// # Errors
    ///
    /// Any parse error for the reconstructed SRN, or `InvalidFormat` if a
    /// segment contains a dot.
    pub fn parse<S: AsRef<str>>(segments: &[S]) -> Result<Scope> {
        let mut raw = String::from(grammar::SRN_VERSION);
        for segment in segments {
            let segment = segment.as_ref();
            if segment.contains('.') {
                return Err(ScopeError::invalid_format(
                    format!("path segment '{}' cannot contain '.'", segment),
                    segment,
                ));
            }
            raw.push('.');
            raw.push_str(segment);
        }
        Scope::from_string(&raw)
    }
}

/// Field-wise containment over derived segments. The first three segments
/// (workspace, subject type, subject id) must be equal; each optional level
/// carries a distinct prefix and appears at most once, so the remaining
/// segments compare as a set.
pub(crate) fn segments_contain(parent: &[&str], child: &[&str]) -> bool {
    const SUBJECT_LEN: usize = 3;
    if parent.len() < SUBJECT_LEN || child.len() < SUBJECT_LEN {
        return false;
    }
    let (parent_subject, parent_levels) = parent.split_at(SUBJECT_LEN);
    let (child_subject, child_levels) = child.split_at(SUBJECT_LEN);

    parent_subject == child_subject
        && parent_levels.iter().all(|level| child_levels.contains(level))
}

/// Rejects values that could escape a directory when used as a path segment.
pub(crate) fn check_segment(field: &str, value: &str) -> Result<()> {
    if value.is_empty()
        || value.contains(['/', '\\', '\0'])
        || value.contains("..")
        || value == "."
    {
        return Err(ScopeError::invalid_identifier(
            field,
            value,
            "contains path separators or traversal sequences",
        ));
    }
    Ok(())
}
