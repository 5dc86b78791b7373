//! Lookup of records that already exist in the system

use crate::config::DirectoryConfig;
use std::collections::HashSet;

/// Answers "does this key already exist?" for duplicate detection.
///
/// Keys are compared case-insensitively.
pub trait ExistingRecords: Send + Sync {
    fn email_exists(&self, email: &str) -> bool;
    fn role_exists(&self, name: &str) -> bool;
}

/// Fixed membership sets, usually loaded from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    emails: HashSet<String>,
    roles: HashSet<String>,
}

impl StaticDirectory {
    pub fn new<E, R>(emails: E, roles: R) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_lowercase())
                .collect(),
            roles: roles
                .into_iter()
                .map(|r| r.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self::new(&config.emails, &config.roles)
    }
}

impl ExistingRecords for StaticDirectory {
    fn email_exists(&self, email: &str) -> bool {
        self.emails.contains(&email.trim().to_lowercase())
    }

    fn role_exists(&self, name: &str) -> bool {
        self.roles.contains(&name.trim().to_lowercase())
    }
}
