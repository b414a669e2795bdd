//! Operations over sets of scopes and legacy workspace compatibility.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::model::{Scope, ScopeField};
use crate::error::{Result, ScopeError};
use crate::srn::{self, SrnComponents, SubjectType};

static LEGACY_WORKSPACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-fA-F0-9]{32}$").expect("legacy workspace pattern is valid"));

/// Constraint a merged filter places on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldConstraint {
    Eq(String),
    In(BTreeSet<String>),
}

impl FieldConstraint {
    pub fn allows(&self, value: &str) -> bool {
        match self {
            Self::Eq(expected) => expected == value,
            Self::In(values) => values.contains(value),
        }
    }
}

/// Filter matching any of several scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergedScopeFilter {
    fields: BTreeMap<ScopeField, FieldConstraint>,
}

impl MergedScopeFilter {
    pub fn get(&self, field: ScopeField) -> Option<&FieldConstraint> {
        self.fields.get(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ScopeField, &FieldConstraint)> {
        self.fields.iter()
    }
}

/// Resolves relations across scopes and maps legacy workspaces to scopes.
#[derive(Debug, Clone)]
pub struct ScopeResolver {
    default_subject_type: SubjectType,
    default_subject_id: String,
}

impl Default for ScopeResolver {
    fn default() -> Self {
        Self {
            default_subject_type: SubjectType::System,
            default_subject_id: "default".to_string(),
        }
    }
}

impl ScopeResolver {
    /// Creates a resolver with custom legacy defaults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentifier` if `default_subject_id` is not a valid
    /// identifier.
    pub fn new(default_subject_type: SubjectType, default_subject_id: impl Into<String>) -> Result<Self> {
        let default_subject_id = default_subject_id.into();
        srn::grammar::validate_identifier("subject_id", &default_subject_id)?;
        Ok(Self {
            default_subject_type,
            default_subject_id,
        })
    }

    pub fn default_subject_type(&self) -> SubjectType {
        self.default_subject_type
    }

    pub fn default_subject_id(&self) -> &str {
        &self.default_subject_id
    }

    /// Most specific scope that is a parent of every given scope.
    ///
    /// Returns `Ok(None)` for an empty input.
    ///
    /// # Errors
    ///
    /// Returns `ScopeResolution` when the scopes span different workspaces or
    /// subjects.
    pub fn common_parent(&self, scopes: &[Scope]) -> Result<Option<Scope>> {
        let Some(first) = scopes.first() else {
            return Ok(None);
        };

        for scope in &scopes[1..] {
            if scope.workspace() != first.workspace()
                || scope.subject_type() != first.subject_type()
                || scope.subject_id() != first.subject_id()
            {
                return Err(ScopeError::resolution(format!(
                    "no common parent: '{}' and '{}' are anchored to different subjects",
                    first, scope
                )));
            }
        }

        fn shared<'a>(
            scopes: &'a [Scope],
            level: impl Fn(&'a Scope) -> Option<&'a str>,
        ) -> Option<String> {
            let value = level(&scopes[0])?;
            scopes
                .iter()
                .all(|scope| level(scope) == Some(value))
                .then(|| value.to_string())
        }

        let mut components: SrnComponents = first.components().clone();
        components.project = shared(scopes, Scope::project);
        components.thread = shared(scopes, Scope::thread);
        components.topic = shared(scopes, Scope::topic);
        Ok(Some(Scope::from_components(components)))
    }

    /// Scopes whose canonical string matches a shell-style pattern
    /// (`*` any run, `?` any single character). Output is sorted.
    pub fn find_matching(&self, pattern: &str, scopes: &[Scope]) -> Result<Vec<Scope>> {
        let matcher = glob_to_regex(&srn::canonicalize(pattern))?;
        let mut matching: Vec<Scope> = scopes
            .iter()
            .filter(|scope| matcher.is_match(scope.as_str()))
            .cloned()
            .collect();
        matching.sort();
        matching.dedup();
        Ok(matching)
    }

    /// Merges scopes into one filter: a single value per field becomes an
    /// equality, several values become an `in` set.
    pub fn merge_filters(&self, scopes: &[Scope]) -> MergedScopeFilter {
        let mut values: BTreeMap<ScopeField, BTreeSet<String>> = BTreeMap::new();
        for scope in scopes {
            for (field, value) in scope.to_filter().iter() {
                values.entry(field).or_default().insert(value.to_string());
            }
        }

        let fields = values
            .into_iter()
            .map(|(field, set)| {
                let constraint = if set.len() == 1 {
                    FieldConstraint::Eq(set.into_iter().next().unwrap_or_default())
                } else {
                    FieldConstraint::In(set)
                };
                (field, constraint)
            })
            .collect();
        MergedScopeFilter { fields }
    }

    /// Scope implied by a legacy workspace identifier.
    ///
    /// # Errors
    ///
    /// Returns `ScopeResolution` if the workspace is not 32 hex characters.
    pub fn from_legacy_workspace(&self, workspace: &str) -> Result<Scope> {
        if !LEGACY_WORKSPACE_PATTERN.is_match(workspace) {
            return Err(ScopeError::resolution(format!(
                "invalid legacy workspace format: '{}'",
                workspace
            )));
        }
        Scope::base(
            workspace.to_lowercase(),
            self.default_subject_type,
            self.default_subject_id.clone(),
        )
        .map_err(|e| {
            ScopeError::resolution(format!(
                "failed to create scope from workspace '{}': {}",
                workspace, e
            ))
        })
    }

    /// Legacy workspace identifier a scope lives in.
    pub fn workspace_of<'a>(&self, scope: &'a Scope) -> &'a str {
        scope.workspace()
    }
}

fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 2);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr)
        .map_err(|e| ScopeError::invalid_format(format!("invalid pattern: {}", e), pattern))
}
