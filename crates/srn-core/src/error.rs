//! Error types for scope resolution and workspace migration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable error kind.
///
/// This is the value surfaced across the API/CLI boundary and recorded in a
/// migration job's error list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidFormat,
    InvalidWorkspace,
    InvalidSubjectType,
    InvalidIdentifier,
    ScopeResolution,
    MigrationValidation,
    MigrationConflict,
    MigrationExecution,
    Storage,
    Cancelled,
    LeaseUnavailable,
    NotFound,
    Io,
    Serialization,
    Config,
}

impl ErrorKind {
    /// Returns the snake_case name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "invalid_format",
            Self::InvalidWorkspace => "invalid_workspace",
            Self::InvalidSubjectType => "invalid_subject_type",
            Self::InvalidIdentifier => "invalid_identifier",
            Self::ScopeResolution => "scope_resolution",
            Self::MigrationValidation => "migration_validation",
            Self::MigrationConflict => "migration_conflict",
            Self::MigrationExecution => "migration_execution",
            Self::Storage => "storage",
            Self::Cancelled => "cancelled",
            Self::LeaseUnavailable => "lease_unavailable",
            Self::NotFound => "not_found",
            Self::Io => "io",
            Self::Serialization => "serialization",
            Self::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shared error type for SRN parsing, scope resolution and migration.
///
/// Parse-time variants carry the offending segment so callers can point at
/// exactly what to correct.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScopeError {
    /// The overall SRN shape does not match the grammar.
    #[error("Invalid SRN format: {message}")]
    InvalidFormat { message: String, segment: String },

    /// The workspace segment is not 32 lowercase hex characters.
    #[error("Invalid workspace '{workspace}': must be exactly 32 lowercase hexadecimal characters")]
    InvalidWorkspace { workspace: String },

    /// The subject type is not a member of the closed enumeration.
    #[error("Invalid subject type '{subject_type}'. Valid types: {valid}")]
    InvalidSubjectType { subject_type: String, valid: String },

    /// An identifier violates the charset/length rule.
    #[error("Invalid {field} '{value}': {message}")]
    InvalidIdentifier {
        field: String,
        value: String,
        message: String,
    },

    /// A hierarchy relation was requested between incompatible scopes.
    #[error("Scope resolution error: {0}")]
    ScopeResolution(String),

    /// Planning-time validation failure.
    #[error("Migration validation error: {0}")]
    MigrationValidation(String),

    /// Target address already holds data not written by this job.
    #[error("Migration conflict at '{target}': {message}")]
    MigrationConflict { target: String, message: String },

    /// Adapter-level failure while executing a migration.
    #[error("Migration execution error: {0}")]
    MigrationExecution(String),

    /// Raised by storage adapters.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The job was cancelled between batches.
    #[error("Migration cancelled: {0}")]
    Cancelled(String),

    /// Another execution holds the exclusive lease for this job.
    #[error("Job '{job_id}' is locked by another execution")]
    LeaseUnavailable { job_id: String },

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound { entity_type: String, id: String },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScopeError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates an InvalidFormat error for the given segment.
    pub fn invalid_format(message: impl Into<String>, segment: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
            segment: segment.into(),
        }
    }

    /// Creates an InvalidIdentifier error.
    pub fn invalid_identifier(
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidIdentifier {
            field: field.into(),
            value: value.into(),
            message: message.into(),
        }
    }

    /// Creates a ScopeResolution error
    pub fn resolution(message: impl Into<String>) -> Self {
        Self::ScopeResolution(message.into())
    }

    /// Creates a MigrationValidation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::MigrationValidation(message.into())
    }

    /// Creates a MigrationConflict error
    pub fn conflict(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MigrationConflict {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Creates a MigrationExecution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::MigrationExecution(message.into())
    }

    /// Creates a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Serialization error
    pub fn serialization(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    // ============================================================================
    // Inspection
    // ============================================================================

    /// Returns the machine-readable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFormat { .. } => ErrorKind::InvalidFormat,
            Self::InvalidWorkspace { .. } => ErrorKind::InvalidWorkspace,
            Self::InvalidSubjectType { .. } => ErrorKind::InvalidSubjectType,
            Self::InvalidIdentifier { .. } => ErrorKind::InvalidIdentifier,
            Self::ScopeResolution(_) => ErrorKind::ScopeResolution,
            Self::MigrationValidation(_) => ErrorKind::MigrationValidation,
            Self::MigrationConflict { .. } => ErrorKind::MigrationConflict,
            Self::MigrationExecution(_) => ErrorKind::MigrationExecution,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::LeaseUnavailable { .. } => ErrorKind::LeaseUnavailable,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Io { .. } => ErrorKind::Io,
            Self::Serialization { .. } => ErrorKind::Serialization,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Returns the offending input segment for parse-time errors.
    pub fn segment(&self) -> Option<&str> {
        match self {
            Self::InvalidFormat { segment, .. } => Some(segment),
            Self::InvalidWorkspace { workspace } => Some(workspace),
            Self::InvalidSubjectType { subject_type, .. } => Some(subject_type),
            Self::InvalidIdentifier { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Check if this is one of the four parse-time errors.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat { .. }
                | Self::InvalidWorkspace { .. }
                | Self::InvalidSubjectType { .. }
                | Self::InvalidIdentifier { .. }
        )
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if re-running the failed operation may succeed without input changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::MigrationExecution(_)
                | Self::Storage(_)
                | Self::Io { .. }
                | Self::Cancelled(_)
                | Self::LeaseUnavailable { .. }
        )
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for ScopeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for ScopeError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("JSON", err.to_string())
    }
}

impl From<toml::de::Error> for ScopeError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization("TOML", err.to_string())
    }
}

impl From<toml::ser::Error> for ScopeError {
    fn from(err: toml::ser::Error) -> Self {
        Self::serialization("TOML", err.to_string())
    }
}

impl From<version_migrate::MigrationError> for ScopeError {
    fn from(err: version_migrate::MigrationError) -> Self {
        use version_migrate::MigrationError;

        match err {
            MigrationError::EntityNotFound(id) => Self::not_found("entity", id),
            MigrationError::TomlParseError(_) | MigrationError::TomlSerializeError(_) => {
                Self::serialization("TOML", err.to_string())
            }
            MigrationError::IoError { .. } => Self::io(err.to_string()),
            _ => Self::serialization("migration", err.to_string()),
        }
    }
}

/// Conversion from anyhow::Error for adapters built on anyhow.
impl From<anyhow::Error> for ScopeError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// A type alias for `Result<T, ScopeError>`.
pub type Result<T> = std::result::Result<T, ScopeError>;
