//! Equality predicates over dedicated scope columns.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::scope::{Scope, ScopeField};
use crate::srn::{SrnComponents, SubjectType};

/// Column name to required value. Absent optional columns carry no
/// predicate at all, so unscoped rows remain readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnPredicates {
    predicates: BTreeMap<String, String>,
}

impl ColumnPredicates {
    pub fn from_scope(scope: &Scope) -> Self {
        let predicates = scope
            .to_filter()
            .iter()
            .map(|(field, value)| (field.as_str().to_string(), value.to_string()))
            .collect();
        Self { predicates }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.predicates.get(column).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Renders `col = $n AND ...` in column order, with parameters numbered
    /// from `first_param`. Returns the clause and its ordered parameters.
    pub fn where_clause(&self, first_param: usize) -> (String, Vec<String>) {
        let mut clauses = Vec::with_capacity(self.predicates.len());
        let mut params = Vec::with_capacity(self.predicates.len());
        for field in ScopeField::ALL {
            if let Some(value) = self.predicates.get(field.as_str()) {
                clauses.push(format!("{} = ${}", field, first_param + params.len()));
                params.push(value.clone());
            }
        }
        (clauses.join(" AND "), params)
    }

    /// `col='value' AND ...` with literal values, for display.
    pub fn render(&self) -> String {
        ScopeField::ALL
            .iter()
            .filter_map(|field| {
                self.predicates
                    .get(field.as_str())
                    .map(|value| format!("{}='{}'", field, value))
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Every predicate here is also present, with the same value, in `other`.
    pub fn is_subset_of(&self, other: &ColumnPredicates) -> bool {
        self.predicates
            .iter()
            .all(|(column, value)| other.predicates.get(column) == Some(value))
    }

    /// Rebuilds the scope from a full predicate set.
    pub fn to_scope(&self) -> Result<Scope> {
        let column = |field: ScopeField| self.predicates.get(field.as_str()).cloned();
        let subject_type = SubjectType::parse(
            &column(ScopeField::SubjectType).unwrap_or_default(),
        )?;
        let mut builder = SrnComponents::builder(
            column(ScopeField::Workspace).unwrap_or_default(),
            subject_type,
            column(ScopeField::SubjectId).unwrap_or_default(),
        );
        if let Some(project) = column(ScopeField::Project) {
            builder = builder.project(project);
        }
        if let Some(thread) = column(ScopeField::Thread) {
            builder = builder.thread(thread);
        }
        if let Some(topic) = column(ScopeField::Topic) {
            builder = builder.topic(topic);
        }
        builder.build().map(Scope::from_components)
    }
}
