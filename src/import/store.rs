//! Persistence for committed rows
//!
//! The pipeline only talks to the [`ImportStore`] trait. [`MemoryStore`]
//! backs the CLI and the tests. It also answers [`ExistingRecords`], so a
//! session validated against the store commits cleanly into it.

use crate::config::DirectoryConfig;
use crate::error::{StoreError, StoreResult};
use crate::import::directory::ExistingRecords;
use crate::import::types::{RecordKind, RoleAssignment, RoleRecord, UserRecord};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// Receipt for one inserted record, used to undo it later
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommittedRecord {
    pub id: Uuid,
    pub kind: RecordKind,
    /// Email for users, role name for roles
    pub key: String,
    pub row_number: usize,
}

/// Row-level persistence operations
#[async_trait]
pub trait ImportStore: Send + Sync {
    async fn insert_role(&self, role: &RoleRecord) -> StoreResult<Uuid>;

    async fn insert_user(&self, user: &UserRecord) -> StoreResult<Uuid>;

    async fn delete(&self, kind: RecordKind, id: Uuid) -> StoreResult<()>;
}

#[derive(Debug, Default)]
struct Tables {
    roles: HashMap<Uuid, RoleRecord>,
    users: HashMap<Uuid, UserRecord>,
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

/// In-memory store
///
/// Records that predate any import are kept as lowercased keys outside the
/// tables, so they can be referenced but never deleted by a rollback.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    existing_emails: HashSet<String>,
    existing_roles: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the configured directory
    pub fn with_existing(directory: &DirectoryConfig) -> Self {
        Self {
            tables: RwLock::default(),
            existing_emails: directory.emails.iter().map(|e| normalize(e)).collect(),
            existing_roles: directory.roles.iter().map(|r| normalize(r)).collect(),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|poisoned| {
            warn!("Store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|poisoned| {
            warn!("Store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn role_count(&self) -> usize {
        self.read().roles.len()
    }

    pub fn user_count(&self) -> usize {
        self.read().users.len()
    }

    /// Whether a role was imported or predates the store
    pub fn has_role(&self, name: &str) -> bool {
        self.existing_roles.contains(&normalize(name)) || Self::role_in(&self.read(), name)
    }

    /// Whether a user was imported or predates the store
    pub fn has_user(&self, email: &str) -> bool {
        self.existing_emails.contains(&normalize(email)) || Self::user_in(&self.read(), email)
    }

    fn role_in(tables: &Tables, name: &str) -> bool {
        let name = normalize(name);
        tables.roles.values().any(|r| normalize(&r.name) == name)
    }

    fn user_in(tables: &Tables, email: &str) -> bool {
        let email = normalize(email);
        tables.users.values().any(|u| normalize(&u.email) == email)
    }
}

impl ExistingRecords for MemoryStore {
    fn email_exists(&self, email: &str) -> bool {
        self.has_user(email)
    }

    fn role_exists(&self, name: &str) -> bool {
        self.has_role(name)
    }
}

#[async_trait]
impl ImportStore for MemoryStore {
    async fn insert_role(&self, role: &RoleRecord) -> StoreResult<Uuid> {
        let mut tables = self.write();
        if self.existing_roles.contains(&normalize(&role.name))
            || Self::role_in(&tables, &role.name)
        {
            return Err(StoreError::Rejected(format!(
                "role '{}' already exists",
                role.name
            )));
        }

        let id = Uuid::new_v4();
        tables.roles.insert(id, role.clone());
        debug!(%id, role = %role.name, "Inserted role");
        Ok(id)
    }

    async fn insert_user(&self, user: &UserRecord) -> StoreResult<Uuid> {
        let mut tables = self.write();
        if self.existing_emails.contains(&normalize(&user.email))
            || Self::user_in(&tables, &user.email)
        {
            return Err(StoreError::Rejected(format!(
                "user '{}' already exists",
                user.email
            )));
        }
        if let RoleAssignment::Custom(name) = &user.role
            && !self.existing_roles.contains(&normalize(name))
            && !Self::role_in(&tables, name)
        {
            return Err(StoreError::Rejected(format!(
                "role '{}' does not exist",
                name
            )));
        }

        let id = Uuid::new_v4();
        tables.users.insert(id, user.clone());
        debug!(%id, email = %user.email, "Inserted user");
        Ok(id)
    }

    async fn delete(&self, kind: RecordKind, id: Uuid) -> StoreResult<()> {
        let mut tables = self.write();
        let removed = match kind {
            RecordKind::Role => tables.roles.remove(&id).is_some(),
            RecordKind::User => tables.users.remove(&id).is_some(),
        };
        if removed {
            debug!(%id, kind = %kind, "Deleted record");
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("{} {}", kind.as_str(), id)))
        }
    }
}
