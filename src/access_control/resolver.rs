//! Access control resolver
//!
//! Answers authorization questions against the static permission table and
//! records the outcome of enforced checks in the audit trail.
//!
//! Resolution order for an enforced check:
//! 1. Deactivated users are denied everything
//! 2. The role's fixed permission set decides

use crate::access_control::permissions::{
    can_access_repository, has_permission, permissions_for,
};
use crate::access_control::types::{PermissionKey, Repository, Role};
use crate::audit::{AuditAction, AuditEvent, AuditOutcome, AuditSink};
use crate::error::AccessDeniedError;
use crate::users::User;
use std::sync::Arc;
use tracing::{debug, trace};

/// Result of access check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Access is allowed
    Allowed,
    /// Access is denied with a reason
    Denied(String),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, AccessDecision::Denied(_))
    }
}

/// Access control resolver
///
/// Stateless apart from the audit sink it reports enforced checks to.
pub struct AccessResolver {
    audit: Option<Arc<dyn AuditSink>>,
}

impl AccessResolver {
    /// Create a resolver that reports enforced checks to `audit`
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self { audit: Some(audit) }
    }

    /// Create a resolver that does not audit
    pub fn unaudited() -> Self {
        Self { audit: None }
    }

    /// Check whether a role holds a permission
    pub fn check(&self, role: Role, key: PermissionKey) -> AccessDecision {
        debug!(role = %role, permission = %key, "Checking access");

        if has_permission(role, key) {
            trace!("Granted by role permission table");
            AccessDecision::Allowed
        } else {
            AccessDecision::Denied(format!("Role '{}' does not grant '{}'", role, key))
        }
    }

    /// Check whether a role may open a repository
    pub fn check_repository(&self, role: Role, repository: Repository) -> AccessDecision {
        debug!(role = %role, repository = %repository, "Checking repository access");

        if can_access_repository(role, repository) {
            AccessDecision::Allowed
        } else {
            AccessDecision::Denied(format!(
                "Role '{}' cannot access the {} repository",
                role, repository
            ))
        }
    }

    /// Enforce that `actor` holds `key`, returning an error if denied
    pub fn require(&self, actor: &User, key: PermissionKey) -> Result<(), AccessDeniedError> {
        let result = if !actor.active {
            Err(AccessDeniedError::inactive_user(key.as_str(), &actor.email))
        } else {
            match self.check(actor.role(), key) {
                AccessDecision::Allowed => Ok(()),
                AccessDecision::Denied(_) => Err(AccessDeniedError::missing_permission(
                    key.as_str(),
                    actor.role().as_str(),
                )),
            }
        };

        self.audit_attempt(actor, key.as_str(), &result);
        result
    }

    /// Enforce that `actor` may open `repository`
    pub fn require_repository(
        &self,
        actor: &User,
        repository: Repository,
    ) -> Result<(), AccessDeniedError> {
        let result = if !actor.active {
            Err(AccessDeniedError::inactive_user(
                format!("access {} repository", repository),
                &actor.email,
            ))
        } else {
            match self.check_repository(actor.role(), repository) {
                AccessDecision::Allowed => Ok(()),
                AccessDecision::Denied(_) => Err(AccessDeniedError::repository_restricted(
                    repository.as_str(),
                    actor.role().as_str(),
                )),
            }
        };

        let target = format!("{}_repository", repository.as_str().to_lowercase());
        self.audit_attempt(actor, &target, &result);
        result
    }

    /// Permissions a role grants, for display
    pub fn granted(&self, role: Role) -> Vec<PermissionKey> {
        permissions_for(role).granted()
    }

    fn audit_attempt(&self, actor: &User, target: &str, result: &Result<(), AccessDeniedError>) {
        let Some(audit) = &self.audit else {
            return;
        };

        let event = match result {
            Ok(()) => AuditEvent::now(
                &actor.email,
                AuditAction::AccessAttempt,
                target,
                AuditOutcome::Success,
            ),
            Err(e) => AuditEvent::now(
                &actor.email,
                AuditAction::AccessAttempt,
                target,
                AuditOutcome::Denied,
            )
            .with_detail(&e.reason),
        };
        audit.record(event);
    }
}

impl Default for AccessResolver {
    fn default() -> Self {
        Self::unaudited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;

    #[test]
    fn test_check_allows_granted_permission() {
        let resolver = AccessResolver::unaudited();
        assert!(
            resolver
                .check(Role::Creator, PermissionKey::CreateContent)
                .is_allowed()
        );
    }

    #[test]
    fn test_check_denies_with_reason() {
        let resolver = AccessResolver::unaudited();
        let decision = resolver.check(Role::Admin, PermissionKey::DeleteContent);
        assert!(decision.is_denied());
        assert_eq!(
            decision,
            AccessDecision::Denied("Role 'Admin' does not grant 'delete_content'".to_string())
        );
    }

    #[test]
    fn test_anonymous_denied_everything() {
        let resolver = AccessResolver::unaudited();
        for key in PermissionKey::all() {
            assert!(resolver.check(Role::Anonymous, *key).is_denied());
        }
        assert!(
            resolver
                .check_repository(Role::Anonymous, Repository::Public)
                .is_denied()
        );
    }

    #[test]
    fn test_require_records_audit_events() {
        let log = Arc::new(AuditLog::new());
        let resolver = AccessResolver::new(log.clone());
        let reviewer = User::new("Rita", "rita@school.edu", Role::Reviewer);

        assert!(resolver.require(&reviewer, PermissionKey::EditContent).is_ok());
        let err = resolver
            .require(&reviewer, PermissionKey::ManageUsers)
            .unwrap_err();
        assert_eq!(err.action, "manage_users");

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].outcome, AuditOutcome::Success);
        assert_eq!(entries[1].outcome, AuditOutcome::Denied);
        assert_eq!(entries[1].action, AuditAction::AccessAttempt);
        assert_eq!(entries[1].actor, "rita@school.edu");
    }

    #[test]
    fn test_require_repository() {
        let log = Arc::new(AuditLog::new());
        let resolver = AccessResolver::new(log.clone());
        let translator = User::new("Tom", "tom@school.edu", Role::Translator);

        assert!(
            resolver
                .require_repository(&translator, Repository::Public)
                .is_ok()
        );
        assert!(
            resolver
                .require_repository(&translator, Repository::Private)
                .is_err()
        );
        assert_eq!(log.entries()[1].target, "private_repository");
    }

    #[test]
    fn test_inactive_user_denied() {
        let resolver = AccessResolver::unaudited();
        let mut admin = User::new("Ada", "ada@school.edu", Role::SuperAdmin);
        admin.deactivate();

        let err = resolver
            .require(&admin, PermissionKey::AccessPublicRepository)
            .unwrap_err();
        assert!(err.reason.contains("deactivated"));
    }
}
