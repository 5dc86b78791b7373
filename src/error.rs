//! Error types for learnhub
//!
//! This module defines the error hierarchy used throughout the application.
//! Row-level CSV problems are not errors in this sense: they are collected as
//! [`ValidationError`](crate::import::ValidationError) values and returned as data.
//! The types here cover file-level rejections, commit/rollback failures,
//! persistence failures, configuration and access denials.

use crate::import::RecordKind;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Import rejected: {0}")]
    Import(#[from] ImportError),

    #[error("Commit pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Access denied: {0}")]
    AccessDenied(#[from] AccessDeniedError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// File-level import rejections.
///
/// Any of these rejects the whole file before a single row is parsed.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ImportError {
    #[error("{kind} file '{file}' must be a .csv file")]
    UnsupportedFileType { kind: RecordKind, file: String },

    #[error("{kind} file '{file}' is {size} bytes, which exceeds the {limit} byte limit")]
    FileTooLarge {
        kind: RecordKind,
        file: String,
        size: u64,
        limit: u64,
    },

    #[error("{kind} file '{file}' has {rows} data rows, but at most {limit} are allowed")]
    TooManyRows {
        kind: RecordKind,
        file: String,
        rows: usize,
        limit: usize,
    },

    #[error("{kind} file '{file}' is empty (a header line is required)")]
    EmptyFile { kind: RecordKind, file: String },

    #[error("{kind} file '{file}' is missing the required column '{column}'")]
    MissingColumn {
        kind: RecordKind,
        file: String,
        column: String,
    },
}

/// Commit pipeline and rollback errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PipelineError {
    #[error("A commit is already running for this import")]
    AlreadyRunning,

    #[error("Nothing to commit: no valid rows are selected")]
    EmptyBatch,

    #[error("Invalid import status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Rollback is not available: {reason}")]
    RollbackUnavailable { reason: String },

    #[error("Rollback incomplete: {undone} of {total} records removed ({reason})")]
    RollbackIncomplete {
        undone: usize,
        total: usize,
        reason: String,
    },
}

/// Persistence errors reported by an [`ImportStore`](crate::import::ImportStore)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The record was refused; other rows may still succeed.
    #[error("Record rejected: {0}")]
    Rejected(String),

    /// The backend cannot be reached; the batch cannot continue.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage call timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
}

impl StoreError {
    /// Whether this error must abort the remaining batch
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Access control errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Access denied for '{action}': {reason}")]
pub struct AccessDeniedError {
    pub action: String,
    pub reason: String,
}

impl AccessDeniedError {
    pub fn new(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_permission(action: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            reason: format!("role '{}' does not grant this permission", role.into()),
        }
    }

    pub fn repository_restricted(repository: impl Into<String>, role: impl Into<String>) -> Self {
        let repository = repository.into();
        Self {
            action: format!("access {} repository", repository),
            reason: format!(
                "role '{}' cannot access the {} repository",
                role.into(),
                repository
            ),
        }
    }

    pub fn inactive_user(action: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            reason: format!("user '{}' is deactivated", user.into()),
        }
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for persistence operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_fatality() {
        assert!(StoreError::Unavailable("connection refused".into()).is_fatal());
        assert!(!StoreError::Rejected("duplicate key".into()).is_fatal());
        assert!(!StoreError::Timeout { timeout_ms: 10 }.is_fatal());
        assert!(!StoreError::NotFound("x".into()).is_fatal());
    }

    #[test]
    fn test_import_error_messages_are_specific() {
        let err = ImportError::TooManyRows {
            kind: RecordKind::User,
            file: "users.csv".into(),
            rows: 101,
            limit: 100,
        };
        let msg = err.to_string();
        assert!(msg.contains("users.csv"));
        assert!(msg.contains("101"));
        assert!(msg.contains("100"));

        let err = ImportError::MissingColumn {
            kind: RecordKind::Role,
            file: "roles.csv".into(),
            column: "role_name".into(),
        };
        assert!(err.to_string().contains("role_name"));
    }

    #[test]
    fn test_access_denied_constructors() {
        let err = AccessDeniedError::missing_permission("delete_content", "Admin");
        assert!(err.reason.contains("Admin"));

        let err = AccessDeniedError::repository_restricted("Private", "Creator");
        assert!(err.reason.contains("Private"));
        assert!(err.reason.contains("Creator"));

        let err = AccessDeniedError::inactive_user("edit_content", "jane@school.edu");
        assert!(err.reason.contains("deactivated"));
    }
}
