//! Import data model
//!
//! Parsed rows, the records they describe, and validation errors.

use crate::access_control::Role;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Which CSV dataset a row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    User,
    Role,
}

impl RecordKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RecordKind::User => "user",
            RecordKind::Role => "role",
        }
    }

    /// Capitalized label used in messages
    pub const fn label(&self) -> &'static str {
        match self {
            RecordKind::User => "User",
            RecordKind::Role => "Role",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A single row-level validation problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// 1-based data row number (the header is not counted)
    pub row: usize,
    pub field: String,
    pub message: String,
    pub kind: RecordKind,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} row {}, field '{}': {}",
            self.kind, self.row, self.field, self.message
        )
    }
}

/// Problem found in one field while checking a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A parsed CSV row and its validation state
#[derive(Debug, Clone, Serialize)]
pub struct ImportRow<T> {
    /// 1-based data row number
    pub row_number: usize,
    /// Raw values keyed by lowercased header name
    pub fields: BTreeMap<String, String>,
    /// Typed view of the fields, re-derived on every validation
    pub record: T,
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub is_selected: bool,
    /// Column whose quoted value never closed on this line
    #[serde(skip)]
    pub(crate) open_quote: Option<String>,
}

impl<T> ImportRow<T> {
    pub(crate) fn new(row_number: usize, fields: BTreeMap<String, String>, record: T) -> Self {
        Self {
            row_number,
            fields,
            record,
            is_valid: false,
            errors: Vec::new(),
            is_selected: false,
            open_quote: None,
        }
    }

    pub(crate) fn with_open_quote(mut self, column: Option<String>) -> Self {
        self.open_quote = column;
        self
    }

    /// Tokenizer problem carried into every validation of this row
    pub(crate) fn quoting_issue(&self) -> Option<FieldIssue> {
        self.open_quote.as_ref().map(|column| {
            FieldIssue::new(
                column.as_str(),
                format!(
                    "Quoted value in column '{column}' is missing its closing quote \
                     (quoted values cannot span lines)"
                ),
            )
        })
    }

    /// Raw value of a column, empty if the column is absent
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    /// Replace the error list and re-derive validity and selection.
    ///
    /// A row that becomes valid is selected; a row that stays valid keeps
    /// whatever selection it had; an invalid row is never selected.
    pub(crate) fn settle(&mut self, errors: Vec<String>) {
        let was_valid = self.is_valid;
        self.errors = errors;
        self.is_valid = self.errors.is_empty();
        self.is_selected = self.is_valid && (self.is_selected || !was_valid);
    }

    /// Append an error found after the per-file pass
    pub(crate) fn reject(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.is_valid = false;
        self.is_selected = false;
    }

    /// Toggle commit participation. Returns whether the row ends up selected.
    pub(crate) fn select(&mut self, selected: bool) -> bool {
        self.is_selected = selected && self.is_valid;
        self.is_selected
    }
}

/// How an imported user's role is specified
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum RoleAssignment {
    /// One of the canonical roles
    Builtin(Role),
    /// A role defined in the same batch or already present in the system
    Custom(String),
}

impl RoleAssignment {
    pub fn name(&self) -> &str {
        match self {
            RoleAssignment::Builtin(role) => role.as_str(),
            RoleAssignment::Custom(name) => name,
        }
    }
}

impl Default for RoleAssignment {
    fn default() -> Self {
        RoleAssignment::Builtin(Role::Creator)
    }
}

/// Typed view of a user CSV row
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: RoleAssignment,
    pub permissions: serde_json::Map<String, serde_json::Value>,
}

/// Typed view of a role CSV row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleRecord {
    pub name: String,
    pub description: Option<String>,
    /// Permission column name to granted flag
    pub permissions: BTreeMap<String, bool>,
}

impl RoleRecord {
    /// Names of the permission columns marked `X`
    pub fn granted(&self) -> impl Iterator<Item = &str> {
        self.permissions
            .iter()
            .filter_map(|(column, granted)| granted.then_some(column.as_str()))
    }
}

/// One parsed CSV file
#[derive(Debug, Clone, Serialize)]
pub struct Dataset<T> {
    pub file_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<ImportRow<T>>,
    /// Errors from the per-file pass, in row order
    pub errors: Vec<ValidationError>,
}

impl<T> Dataset<T> {
    pub fn valid_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_valid).count()
    }

    pub fn selected_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_selected).count()
    }

    pub fn row(&self, row_number: usize) -> Option<&ImportRow<T>> {
        self.rows.iter().find(|row| row.row_number == row_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ImportRow<()> {
        ImportRow::new(1, BTreeMap::new(), ())
    }

    #[test]
    fn test_settle_valid_row_is_selected() {
        let mut row = row();
        row.settle(vec![]);
        assert!(row.is_valid);
        assert!(row.is_selected);
    }

    #[test]
    fn test_settle_invalid_row_is_deselected() {
        let mut row = row();
        row.settle(vec!["Email is required".to_string()]);
        assert!(!row.is_valid);
        assert!(!row.is_selected);
    }

    #[test]
    fn test_settle_keeps_manual_deselection() {
        let mut row = row();
        row.settle(vec![]);
        row.select(false);
        row.settle(vec![]);
        assert!(row.is_valid);
        assert!(!row.is_selected);
    }

    #[test]
    fn test_invalid_row_cannot_be_selected() {
        let mut row = row();
        row.settle(vec!["bad".to_string()]);
        assert!(!row.select(true));
    }

    #[test]
    fn test_reject_flips_validity() {
        let mut row = row();
        row.settle(vec![]);
        row.reject("Role 'Editor' is not defined");
        assert!(!row.is_valid);
        assert!(!row.is_selected);
        assert_eq!(row.errors.len(), 1);
    }

    #[test]
    fn test_quoting_issue_names_column() {
        assert!(row().quoting_issue().is_none());
        let issue = row()
            .with_open_quote(Some("permissions".into()))
            .quoting_issue()
            .unwrap();
        assert_eq!(issue.field, "permissions");
        assert!(issue.message.contains("missing its closing quote"));
    }

    #[test]
    fn test_missing_field_is_empty() {
        assert_eq!(row().field("phone"), "");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError {
            row: 3,
            field: "email".to_string(),
            message: "Email is required".to_string(),
            kind: RecordKind::User,
        };
        assert_eq!(
            err.to_string(),
            "User row 3, field 'email': Email is required"
        );
    }
}
