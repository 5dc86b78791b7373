//! Audit trail
//!
//! Append-only record of create/edit/delete/import/rollback and access
//! attempt events. Producers treat the sink as fire-and-forget.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Default number of events retained by [`AuditLog`]
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Edit,
    Delete,
    Import,
    Rollback,
    AccessAttempt,
}

impl AuditAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Edit => "edit",
            AuditAction::Delete => "delete",
            AuditAction::Import => "import",
            AuditAction::Rollback => "rollback",
            AuditAction::AccessAttempt => "access_attempt",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How it ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

impl AuditOutcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Failure => "failure",
            AuditOutcome::Denied => "denied",
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single audit record
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub id: Uuid,
    /// Who acted (email or a system name)
    pub actor: String,
    pub action: AuditAction,
    /// What was acted on
    pub target: String,
    pub outcome: AuditOutcome,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEvent {
    /// Create an event timestamped to now
    pub fn now(
        actor: impl Into<String>,
        action: AuditAction,
        target: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor: actor.into(),
            action,
            target: target.into(),
            outcome,
            timestamp: Utc::now(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Destination for audit events
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Bounded in-memory audit log
///
/// Keeps the most recent `capacity` events; the oldest is evicted first.
/// Every event is also emitted on the `audit` tracing target.
pub struct AuditLog {
    events: RwLock<VecDeque<AuditEvent>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    // Poisoned locks are recovered

    fn write_events(&self) -> RwLockWriteGuard<'_, VecDeque<AuditEvent>> {
        self.events.write().unwrap_or_else(|poisoned| {
            tracing::warn!("audit log lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn read_events(&self) -> RwLockReadGuard<'_, VecDeque<AuditEvent>> {
        self.events.read().unwrap_or_else(|poisoned| {
            tracing::warn!("audit log lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Snapshot of retained events, oldest first
    pub fn entries(&self) -> Vec<AuditEvent> {
        self.read_events().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read_events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_events().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for AuditLog {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "audit",
            actor = %event.actor,
            action = %event.action,
            target_name = %event.target,
            outcome = %event.outcome,
            detail = ?event.detail,
            "audit event"
        );

        let mut events = self.write_events();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }
}
