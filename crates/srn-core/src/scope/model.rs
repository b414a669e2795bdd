//! Scope domain model.
//!
//! A [`Scope`] wraps validated [`SrnComponents`] and adds hierarchy
//! operations. Scopes are immutable: narrowing or widening a scope always
//! produces a new value.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{Result, ScopeError};
use crate::srn::{self, SrnComponents, SubjectType};

/// A resolved, comparable scope.
///
/// Equality, hashing and ordering all use the canonical SRN string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scope {
    components: SrnComponents,
    canonical: String,
}

/// How one scope relates to another anchored to the same subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeRelation {
    /// Both scopes are identical.
    Same,
    /// The receiver strictly contains the other scope.
    Ancestor,
    /// The receiver is strictly contained by the other scope.
    Descendant,
    /// Same subject, but neither contains the other.
    Divergent,
}

impl Scope {
    /// Wraps already validated components.
    pub fn from_components(components: SrnComponents) -> Self {
        let canonical = srn::serialize(&components);
        Self {
            components,
            canonical,
        }
    }

    /// Parses a raw SRN string, surfacing the parser's errors unchanged.
    pub fn from_string(raw: &str) -> Result<Self> {
        srn::parse(raw).map(Self::from_components)
    }

    /// Builds the base scope for a subject (depth 0).
    pub fn base(
        workspace: impl Into<String>,
        subject_type: SubjectType,
        subject_id: impl Into<String>,
    ) -> Result<Self> {
        SrnComponents::builder(workspace, subject_type, subject_id)
            .build()
            .map(Self::from_components)
    }

    pub fn components(&self) -> &SrnComponents {
        &self.components
    }

    /// Canonical SRN string.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    pub fn workspace(&self) -> &str {
        self.components.workspace()
    }

    pub fn subject_type(&self) -> SubjectType {
        self.components.subject_type()
    }

    pub fn subject_id(&self) -> &str {
        self.components.subject_id()
    }

    pub fn project(&self) -> Option<&str> {
        self.components.project()
    }

    pub fn thread(&self) -> Option<&str> {
        self.components.thread()
    }

    pub fn topic(&self) -> Option<&str> {
        self.components.topic()
    }

    /// Number of populated hierarchy levels beyond the subject (0-3).
    pub fn depth(&self) -> usize {
        [self.project(), self.thread(), self.topic()]
            .iter()
            .filter(|level| level.is_some())
            .count()
    }

    /// Storage filter containing only populated fields.
    pub fn to_filter(&self) -> ScopeFilter {
        let mut fields = BTreeMap::new();
        fields.insert(ScopeField::Workspace, self.workspace().to_string());
        fields.insert(ScopeField::SubjectType, self.subject_type().to_string());
        fields.insert(ScopeField::SubjectId, self.subject_id().to_string());
        if let Some(project) = self.project() {
            fields.insert(ScopeField::Project, project.to_string());
        }
        if let Some(thread) = self.thread() {
            fields.insert(ScopeField::Thread, thread.to_string());
        }
        if let Some(topic) = self.topic() {
            fields.insert(ScopeField::Topic, topic.to_string());
        }
        ScopeFilter { fields }
    }

    fn same_subject(&self, other: &Scope) -> bool {
        self.workspace() == other.workspace()
            && self.subject_type() == other.subject_type()
            && self.subject_id() == other.subject_id()
    }

    /// Returns true if every level populated here equals the same level in
    /// `other`. Reflexive: a scope is a parent of itself.
    pub fn is_parent_of(&self, other: &Scope) -> bool {
        fn constrains(parent: Option<&str>, child: Option<&str>) -> bool {
            match parent {
                None => true,
                Some(value) => child == Some(value),
            }
        }

        self.same_subject(other)
            && constrains(self.project(), other.project())
            && constrains(self.thread(), other.thread())
            && constrains(self.topic(), other.topic())
    }

    /// Parent relation excluding equality.
    pub fn is_strict_parent_of(&self, other: &Scope) -> bool {
        self != other && self.is_parent_of(other)
    }

    pub fn is_child_of(&self, other: &Scope) -> bool {
        other.is_parent_of(self)
    }

    /// Symmetric visibility check: one of the two scopes contains the other.
    pub fn matches(&self, other: &Scope) -> bool {
        self.is_parent_of(other) || other.is_parent_of(self)
    }

    /// Classifies the relation between two scopes of the same subject.
    ///
    /// # Errors
    ///
    /// Returns `ScopeResolution` when the scopes belong to different
    /// workspaces or subjects, since no hierarchy relation exists between them.
    pub fn relation_to(&self, other: &Scope) -> Result<ScopeRelation> {
        if self.workspace() != other.workspace() {
            return Err(ScopeError::resolution(format!(
                "scopes '{}' and '{}' belong to different workspaces",
                self, other
            )));
        }
        if !self.same_subject(other) {
            return Err(ScopeError::resolution(format!(
                "scopes '{}' and '{}' are anchored to different subjects",
                self, other
            )));
        }

        let relation = if self == other {
            ScopeRelation::Same
        } else if self.is_parent_of(other) {
            ScopeRelation::Ancestor
        } else if other.is_parent_of(self) {
            ScopeRelation::Descendant
        } else {
            ScopeRelation::Divergent
        };
        Ok(relation)
    }

    /// Immediate parent: drops topic, then thread, then project.
    pub fn parent(&self) -> Option<Scope> {
        let mut components = self.components.clone();
        if components.topic.is_some() {
            components.topic = None;
        } else if components.thread.is_some() {
            components.thread = None;
        } else if components.project.is_some() {
            components.project = None;
        } else {
            return None;
        }
        Some(Self::from_components(components))
    }

    /// Inheritance chain from this scope up to the base scope, most specific
    /// first.
    pub fn ancestors(&self) -> Vec<Scope> {
        let mut chain = vec![self.clone()];
        let mut current = self.parent();
        while let Some(scope) = current {
            current = scope.parent();
            chain.push(scope);
        }
        chain
    }

    /// Returns a new scope with the project level set.
    pub fn with_project(&self, project: &str) -> Result<Scope> {
        self.narrowed("project", project)
    }

    /// Returns a new scope with the thread level set.
    pub fn with_thread(&self, thread: &str) -> Result<Scope> {
        self.narrowed("thread", thread)
    }

    /// Returns a new scope with the topic level set.
    pub fn with_topic(&self, topic: &str) -> Result<Scope> {
        self.narrowed("topic", topic)
    }

    fn narrowed(&self, field: &str, value: &str) -> Result<Scope> {
        srn::grammar::validate_identifier(field, value)?;
        let mut components = self.components.clone();
        let value = Some(value.to_string());
        match field {
            "project" => components.project = value,
            "thread" => components.thread = value,
            _ => components.topic = value,
        }
        Ok(Self::from_components(components))
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Scope {}

impl Hash for Scope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for Scope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scope {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl FromStr for Scope {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_string(s)
    }
}

impl TryFrom<String> for Scope {
    type Error = ScopeError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_string(&value)
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.canonical
    }
}

// ============================================================================
// ScopeFilter
// ============================================================================

/// A filterable scope field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ScopeField {
    Workspace,
    SubjectType,
    SubjectId,
    Project,
    Thread,
    Topic,
}

impl ScopeField {
    pub const ALL: [ScopeField; 6] = [
        ScopeField::Workspace,
        ScopeField::SubjectType,
        ScopeField::SubjectId,
        ScopeField::Project,
        ScopeField::Thread,
        ScopeField::Topic,
    ];

    /// Column / record field name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::SubjectType => "subject_type",
            Self::SubjectId => "subject_id",
            Self::Project => "project",
            Self::Thread => "thread",
            Self::Topic => "topic",
        }
    }
}

impl std::fmt::Display for ScopeField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-to-value mapping derived from a scope.
///
/// Absent optional levels are simply missing from the map; there is no
/// null or empty-string sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeFilter {
    fields: BTreeMap<ScopeField, String>,
}

impl ScopeFilter {
    pub fn get(&self, field: ScopeField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: ScopeField) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates populated fields in column order.
    pub fn iter(&self) -> impl Iterator<Item = (ScopeField, &str)> {
        self.fields.iter().map(|(field, value)| (*field, value.as_str()))
    }

    /// Plain string map keyed by field name.
    pub fn to_map(&self) -> BTreeMap<&'static str, String> {
        self.fields
            .iter()
            .map(|(field, value)| (field.as_str(), value.clone()))
            .collect()
    }

    /// Returns true if every predicate equals the record's value for that
    /// field. Fields absent from the filter are unconstrained.
    pub fn matches_record<K, V>(&self, record: &BTreeMap<K, V>) -> bool
    where
        K: Borrow<str> + Ord,
        V: AsRef<str>,
    {
        self.fields.iter().all(|(field, expected)| {
            record
                .get(field.as_str())
                .is_some_and(|actual| actual.as_ref() == expected)
        })
    }
}
