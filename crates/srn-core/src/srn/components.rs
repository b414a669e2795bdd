//! Parsed SRN components and the validating builder.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use super::grammar::{self, SRN_VERSION};
use crate::error::{Result, ScopeError};

/// Closed set of entities a scope can be anchored to.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubjectType {
    User,
    Agent,
    Workspace,
    Contact,
    Project,
    System,
}

impl SubjectType {
    /// Returns the grammar token for this subject type.
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    /// Parses a subject type token, failing with `InvalidSubjectType`.
    pub fn parse(value: &str) -> Result<Self> {
        value
            .parse::<SubjectType>()
            .map_err(|_| ScopeError::InvalidSubjectType {
                subject_type: value.to_string(),
                valid: Self::valid_list(),
            })
    }

    /// Comma separated list of every accepted token.
    pub fn valid_list() -> String {
        SubjectType::iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Validated components of a Scope Resource Name.
///
/// Instances only come out of [`grammar::parse`] or [`SrnBuilder::build`],
/// so every populated field already satisfies its charset/length rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SrnComponents {
    pub(crate) version: String,
    pub(crate) workspace: String,
    pub(crate) subject_type: SubjectType,
    pub(crate) subject_id: String,
    pub(crate) project: Option<String>,
    pub(crate) thread: Option<String>,
    pub(crate) topic: Option<String>,
}

impl SrnComponents {
    /// Starts a builder for the mandatory part of an SRN.
    pub fn builder(
        workspace: impl Into<String>,
        subject_type: SubjectType,
        subject_id: impl Into<String>,
    ) -> SrnBuilder {
        SrnBuilder {
            workspace: workspace.into(),
            subject_type,
            subject_id: subject_id.into(),
            project: None,
            thread: None,
            topic: None,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn subject_type(&self) -> SubjectType {
        self.subject_type
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub fn thread(&self) -> Option<&str> {
        self.thread.as_deref()
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Ordered field map; unpopulated optional fields are omitted.
    pub fn to_map(&self) -> BTreeMap<&'static str, String> {
        let mut map = BTreeMap::new();
        map.insert("version", self.version.clone());
        map.insert("workspace", self.workspace.clone());
        map.insert("subject_type", self.subject_type.to_string());
        map.insert("subject_id", self.subject_id.clone());
        if let Some(project) = &self.project {
            map.insert("project", project.clone());
        }
        if let Some(thread) = &self.thread {
            map.insert("thread", thread.clone());
        }
        if let Some(topic) = &self.topic {
            map.insert("topic", topic.clone());
        }
        map
    }

    /// Re-checks every field against the grammar rules.
    pub fn revalidate(&self) -> Result<()> {
        if self.version != SRN_VERSION {
            return Err(ScopeError::invalid_format(
                format!("unsupported version '{}'", self.version),
                self.version.clone(),
            ));
        }
        grammar::validate_workspace(&self.workspace)?;
        grammar::validate_identifier("subject_id", &self.subject_id)?;
        for (field, value) in [
            ("project", &self.project),
            ("thread", &self.thread),
            ("topic", &self.topic),
        ] {
            if let Some(value) = value {
                grammar::validate_identifier(field, value)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for SrnComponents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&grammar::serialize(self))
    }
}

/// Builder that validates each field before producing [`SrnComponents`].
#[derive(Debug, Clone)]
pub struct SrnBuilder {
    workspace: String,
    subject_type: SubjectType,
    subject_id: String,
    project: Option<String>,
    thread: Option<String>,
    topic: Option<String>,
}

impl SrnBuilder {
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn thread(mut self, thread: impl Into<String>) -> Self {
        self.thread = Some(thread.into());
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Validates all fields and produces the components.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWorkspace` or `InvalidIdentifier` naming the first
    /// offending field.
    pub fn build(self) -> Result<SrnComponents> {
        let components = SrnComponents {
            version: SRN_VERSION.to_string(),
            workspace: self.workspace,
            subject_type: self.subject_type,
            subject_id: self.subject_id,
            project: self.project,
            thread: self.thread,
            topic: self.topic,
        };
        components.revalidate()?;
        Ok(components)
    }
}
