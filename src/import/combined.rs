//! Cross-dataset validation
//!
//! Every user row that references a custom role must point at a valid,
//! selected role row in the same batch or at a role already in the system.
//! Rows that fail this check lose their validity and selection.

use crate::import::directory::ExistingRecords;
use crate::import::types::{
    ImportRow, RecordKind, RoleAssignment, RoleRecord, UserRecord, ValidationError,
};
use std::collections::HashSet;
use tracing::debug;

/// Run the combined pass over already-validated rows.
///
/// Only rows that are still valid are checked, so a user row carries at most
/// one combined error.
pub fn cross_validate(
    users: &mut [ImportRow<UserRecord>],
    roles: Option<&[ImportRow<RoleRecord>]>,
    existing: &dyn ExistingRecords,
) -> Vec<ValidationError> {
    let mut defined = HashSet::new();
    let mut excluded = HashSet::new();
    for row in roles.unwrap_or_default().iter().filter(|row| row.is_valid) {
        let name = row.record.name.to_lowercase();
        if row.is_selected {
            defined.insert(name);
        } else {
            excluded.insert(name);
        }
    }

    let mut errors = Vec::new();
    for row in users.iter_mut().filter(|row| row.is_valid) {
        let RoleAssignment::Custom(name) = &row.record.role else {
            continue;
        };
        let key = name.to_lowercase();
        if defined.contains(&key) || existing.role_exists(name) {
            continue;
        }

        let message = if excluded.contains(&key) {
            format!("Role '{name}' is excluded from this import")
        } else {
            format!("Role '{name}' is not defined")
        };
        errors.push(ValidationError {
            row: row.row_number,
            field: "role".to_string(),
            message: message.clone(),
            kind: RecordKind::User,
        });
        row.reject(message);
    }

    debug!(errors = errors.len(), "Combined validation finished");
    errors
}
