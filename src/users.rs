//! Users
//!
//! A user carries a role fixed at creation and the permission set derived
//! from it. The "current user" is built from configuration and passed around
//! explicitly; there is no process-wide singleton.

use crate::access_control::{PermissionKey, PermissionSet, Repository, Role, permissions_for};
use crate::config::CurrentUserConfig;
use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    role: Role,
    permissions: PermissionSet,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub active: bool,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            role,
            permissions: *permissions_for(role),
            created_at: Utc::now(),
            last_login: None,
            active: true,
        }
    }

    /// Build the configured current user
    pub fn from_config(config: &CurrentUserConfig) -> Result<Self, ConfigError> {
        let role = Role::from_name(&config.role).ok_or_else(|| ConfigError::Invalid {
            message: format!(
                "current_user.role must be one of SuperAdmin, Admin, Reviewer, Creator, Translator, got: {}",
                config.role
            ),
        })?;
        Ok(Self::new(&config.name, &config.email, role))
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    /// Whether the user currently holds `key`. Deactivated users hold nothing.
    pub fn can(&self, key: PermissionKey) -> bool {
        self.active && self.permissions.get(key)
    }

    pub fn can_access(&self, repository: Repository) -> bool {
        self.can(repository.permission())
    }

    pub fn record_login(&mut self, at: DateTime<Utc>) {
        self.last_login = Some(at);
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn activate(&mut self) {
        self.active = true;
    }
}
