//! Import session
//!
//! Holds the user and role datasets of one bulk import between upload and
//! commit.

use crate::error::ImportError;
use crate::import::combined::cross_validate;
use crate::import::directory::ExistingRecords;
use crate::import::file::ImportFile;
use crate::import::pipeline::CommitBatch;
use crate::import::role_rows::{parse_roles, validate_role_rows};
use crate::import::types::{Dataset, RecordKind, RoleRecord, UserRecord, ValidationError};
use crate::import::user_rows::{parse_users, validate_user_rows};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

/// Row counts for display
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub user_rows: usize,
    pub valid_users: usize,
    pub selected_users: usize,
    pub role_rows: usize,
    pub valid_roles: usize,
    pub selected_roles: usize,
    pub errors: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSession {
    pub id: Uuid,
    users: Option<Dataset<UserRecord>>,
    roles: Option<Dataset<RoleRecord>>,
    combined_errors: Vec<ValidationError>,
}

impl ImportSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            users: None,
            roles: None,
            combined_errors: Vec::new(),
        }
    }

    /// Load a user file, replacing any previous one, and revalidate
    pub fn load_users(
        &mut self,
        file: &ImportFile,
        existing: &dyn ExistingRecords,
    ) -> Result<(), ImportError> {
        self.users = Some(parse_users(file, existing)?);
        self.validate(existing);
        Ok(())
    }

    /// Load a role file, replacing any previous one, and revalidate
    pub fn load_roles(
        &mut self,
        file: &ImportFile,
        existing: &dyn ExistingRecords,
    ) -> Result<(), ImportError> {
        self.roles = Some(parse_roles(file, existing)?);
        self.validate(existing);
        Ok(())
    }

    /// Re-derive every row from its raw fields.
    ///
    /// Roles first, then users, then the combined pass. Running this again
    /// without changes yields the same errors, validity and selection.
    pub fn validate(&mut self, existing: &dyn ExistingRecords) {
        if let Some(roles) = self.roles.as_mut() {
            roles.errors = validate_role_rows(&mut roles.rows, &roles.headers, existing);
        }

        self.combined_errors.clear();
        if let Some(users) = self.users.as_mut() {
            users.errors = validate_user_rows(&mut users.rows, existing);
            let role_rows = self.roles.as_ref().map(|roles| roles.rows.as_slice());
            self.combined_errors = cross_validate(&mut users.rows, role_rows, existing);
        }

        debug!(
            session = %self.id,
            errors = self.error_count(),
            "Session validated"
        );
    }

    pub fn users(&self) -> Option<&Dataset<UserRecord>> {
        self.users.as_ref()
    }

    pub fn roles(&self) -> Option<&Dataset<RoleRecord>> {
        self.roles.as_ref()
    }

    /// Errors from the combined pass only
    pub fn combined_errors(&self) -> &[ValidationError] {
        &self.combined_errors
    }

    /// Include or exclude a row from the commit.
    ///
    /// Returns whether the row ends up selected; invalid or unknown rows are
    /// never selected. Changing a role row revalidates the session, so users
    /// that reference an excluded role drop out of the batch and come back
    /// when it is selected again.
    pub fn set_selected(
        &mut self,
        kind: RecordKind,
        row_number: usize,
        selected: bool,
        existing: &dyn ExistingRecords,
    ) -> bool {
        match kind {
            RecordKind::User => self
                .users
                .as_mut()
                .and_then(|d| d.rows.iter_mut().find(|r| r.row_number == row_number))
                .is_some_and(|row| row.select(selected)),
            RecordKind::Role => {
                let Some(row) = self
                    .roles
                    .as_mut()
                    .and_then(|d| d.rows.iter_mut().find(|r| r.row_number == row_number))
                else {
                    return false;
                };
                let changed = row.is_selected != selected;
                let now_selected = row.select(selected);
                if changed {
                    self.validate(existing);
                }
                now_selected
            }
        }
    }

    /// Every error, users before roles, each in row order
    pub fn error_report(&self) -> Vec<ValidationError> {
        let mut report: Vec<ValidationError> = self
            .users
            .iter()
            .flat_map(|d| d.errors.iter())
            .chain(self.roles.iter().flat_map(|d| d.errors.iter()))
            .chain(self.combined_errors.iter())
            .cloned()
            .collect();
        report.sort_by_key(|e| (e.kind, e.row));
        report
    }

    fn error_count(&self) -> usize {
        self.users.as_ref().map_or(0, |d| d.errors.len())
            + self.roles.as_ref().map_or(0, |d| d.errors.len())
            + self.combined_errors.len()
    }

    pub fn summary(&self) -> ImportSummary {
        ImportSummary {
            user_rows: self.users.as_ref().map_or(0, |d| d.rows.len()),
            valid_users: self.users.as_ref().map_or(0, |d| d.valid_count()),
            selected_users: self.users.as_ref().map_or(0, |d| d.selected_count()),
            role_rows: self.roles.as_ref().map_or(0, |d| d.rows.len()),
            valid_roles: self.roles.as_ref().map_or(0, |d| d.valid_count()),
            selected_roles: self.roles.as_ref().map_or(0, |d| d.selected_count()),
            errors: self.error_count(),
        }
    }

    /// Snapshot the valid, selected rows for commit
    pub fn commit_batch(&self) -> CommitBatch {
        let batch = CommitBatch::from_datasets(self.users.as_ref(), self.roles.as_ref());
        info!(
            session = %self.id,
            roles = batch.role_count(),
            users = batch.user_count(),
            "Prepared commit batch"
        );
        batch
    }
}

impl Default for ImportSession {
    fn default() -> Self {
        Self::new()
    }
}
