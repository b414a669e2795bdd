//! Label sets for graph backends.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{Result, ScopeError};
use crate::scope::Scope;
use crate::srn::{SrnComponents, SubjectType};

pub const WORKSPACE_LABEL: &str = "Workspace_";
pub const SUBJECT_LABEL: &str = "Subject_";
pub const PROJECT_LABEL: &str = "Project_";
pub const THREAD_LABEL: &str = "Thread_";
pub const TOPIC_LABEL: &str = "Topic_";

/// One label per populated hierarchy level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelSet {
    labels: BTreeSet<String>,
}

impl LabelSet {
    pub fn from_scope(scope: &Scope) -> Self {
        let mut labels = BTreeSet::new();
        labels.insert(format!("{}{}", WORKSPACE_LABEL, scope.workspace()));
        labels.insert(format!(
            "{}{}_{}",
            SUBJECT_LABEL,
            scope.subject_type(),
            scope.subject_id()
        ));
        if let Some(project) = scope.project() {
            labels.insert(format!("{}{}", PROJECT_LABEL, project));
        }
        if let Some(thread) = scope.thread() {
            labels.insert(format!("{}{}", THREAD_LABEL, thread));
        }
        if let Some(topic) = scope.topic() {
            labels.insert(format!("{}{}", TOPIC_LABEL, topic));
        }
        Self { labels }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// A node is visible to the query scope only if it carries every label
    /// the query implies.
    pub fn satisfied_by<S: AsRef<str>>(&self, node_labels: &[S]) -> bool {
        self.labels
            .iter()
            .all(|required| node_labels.iter().any(|label| label.as_ref() == required))
    }

    pub fn is_subset_of(&self, other: &LabelSet) -> bool {
        self.labels.is_subset(&other.labels)
    }

    /// Rebuilds the scope from a complete label set.
    pub fn to_scope(&self) -> Result<Scope> {
        let mut workspace = None;
        let mut subject = None;
        let mut project = None;
        let mut thread = None;
        let mut topic = None;

        for label in &self.labels {
            if let Some(value) = label.strip_prefix(WORKSPACE_LABEL) {
                workspace = Some(value);
            } else if let Some(value) = label.strip_prefix(SUBJECT_LABEL) {
                subject = Some(value);
            } else if let Some(value) = label.strip_prefix(PROJECT_LABEL) {
                project = Some(value);
            } else if let Some(value) = label.strip_prefix(THREAD_LABEL) {
                thread = Some(value);
            } else if let Some(value) = label.strip_prefix(TOPIC_LABEL) {
                topic = Some(value);
            } else {
                return Err(ScopeError::invalid_format(
                    format!("unrecognized scope label '{}'", label),
                    label.clone(),
                ));
            }
        }

        let missing = |what: &str| ScopeError::invalid_format(format!("missing {} label", what), "");
        let workspace = workspace.ok_or_else(|| missing("workspace"))?;
        let subject = subject.ok_or_else(|| missing("subject"))?;
        // subject types never contain '_', so the first one splits type from id
        let (subject_type, subject_id) = subject
            .split_once('_')
            .ok_or_else(|| ScopeError::invalid_format("malformed subject label", subject))?;

        let mut builder =
            SrnComponents::builder(workspace, SubjectType::parse(subject_type)?, subject_id);
        if let Some(project) = project {
            builder = builder.project(project);
        }
        if let Some(thread) = thread {
            builder = builder.thread(thread);
        }
        if let Some(topic) = topic {
            builder = builder.topic(topic);
        }
        builder.build().map(Scope::from_components)
    }
}
