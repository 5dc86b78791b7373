//! Configuration types for learnhub
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use serde::Deserialize;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Commit pipeline time budgets
    pub pipeline: PipelineConfig,

    /// Records that already exist in the system
    pub directory: DirectoryConfig,

    /// Identity the CLI acts as
    pub current_user: CurrentUserConfig,

    /// Audit trail settings
    pub audit: AuditConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Commit pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Budget for a single store call, in milliseconds
    pub row_timeout_ms: u64,

    /// Budget for a whole batch, in seconds
    pub batch_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            row_timeout_ms: 5000,
            batch_timeout_secs: 300,
        }
    }
}

/// Existing emails and role names checked for collisions during import
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub emails: Vec<String>,
    pub roles: Vec<String>,
}

/// The user the CLI acts as
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CurrentUserConfig {
    pub name: String,
    pub email: String,

    /// Canonical role name (SuperAdmin, Admin, Reviewer, Creator, Translator)
    pub role: String,
}

impl Default for CurrentUserConfig {
    fn default() -> Self {
        Self {
            name: "Demo Admin".to_string(),
            email: "admin@learnhub.local".to_string(),
            role: "SuperAdmin".to_string(),
        }
    }
}

/// Audit trail configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Number of most recent events kept in memory
    pub capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            capacity: crate::audit::DEFAULT_AUDIT_CAPACITY,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}
