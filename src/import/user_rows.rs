//! User CSV rows
//!
//! Field rules:
//! - `name`: required, 2-60 characters
//! - `email`: required, `local@domain.tld`; case-insensitive uniqueness key
//! - `phone`: optional, digits with an optional leading `+`, spaces, hyphens, parentheses
//! - `role`: optional, defaults to Creator; non-canonical names are custom role references
//! - `permissions`: optional JSON object

use crate::access_control::Role;
use crate::error::ImportError;
use crate::import::directory::ExistingRecords;
use crate::import::file::{ImportFile, open};
use crate::import::types::{
    Dataset, FieldIssue, ImportRow, RecordKind, RoleAssignment, UserRecord, ValidationError,
};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

/// Header of the user template
pub const USER_HEADERS: [&str; 5] = ["name", "email", "phone", "role", "permissions"];

/// Role given to users whose `role` cell is empty
pub const DEFAULT_USER_ROLE: Role = Role::Creator;

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 60;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"))
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[\d\s\-()]+$").expect("valid regex"))
}

/// Whether `email` has the `local@domain.tld` shape
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

fn parse_role(value: &str) -> RoleAssignment {
    if value.is_empty() {
        return RoleAssignment::Builtin(DEFAULT_USER_ROLE);
    }
    match Role::from_name(value) {
        Some(role) => RoleAssignment::Builtin(role),
        None => RoleAssignment::Custom(value.to_string()),
    }
}

/// Build the typed record from raw fields, collecting field-rule violations
fn check_row(row: &ImportRow<UserRecord>) -> (UserRecord, Vec<FieldIssue>) {
    let mut issues: Vec<FieldIssue> = row.quoting_issue().into_iter().collect();

    let name = row.field("name").trim().to_string();
    if name.is_empty() {
        issues.push(FieldIssue::new("name", "Name is required"));
    } else if !(NAME_MIN..=NAME_MAX).contains(&name.chars().count()) {
        issues.push(FieldIssue::new(
            "name",
            format!("Name must be between {NAME_MIN} and {NAME_MAX} characters"),
        ));
    }

    let email = row.field("email").trim().to_string();
    if email.is_empty() {
        issues.push(FieldIssue::new("email", "Email is required"));
    } else if !is_valid_email(&email) {
        issues.push(FieldIssue::new("email", "Invalid email format"));
    }

    let phone = row.field("phone").trim();
    if !phone.is_empty() && !phone_regex().is_match(phone) {
        issues.push(FieldIssue::new("phone", "Invalid phone number format"));
    }

    let role = parse_role(row.field("role").trim());

    let raw_permissions = row.field("permissions").trim();
    let permissions = if raw_permissions.is_empty() {
        serde_json::Map::new()
    } else {
        match serde_json::from_str::<serde_json::Value>(raw_permissions) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => {
                issues.push(FieldIssue::new(
                    "permissions",
                    "Permissions must be a valid JSON object",
                ));
                serde_json::Map::new()
            }
        }
    };

    let record = UserRecord {
        name,
        email,
        phone: (!phone.is_empty()).then(|| phone.to_string()),
        role,
        permissions,
    };
    (record, issues)
}

/// Validate every row from its raw fields.
///
/// Re-derives each row's record, errors, validity and selection, so running
/// it twice over unchanged rows gives the same result.
pub fn validate_user_rows(
    rows: &mut [ImportRow<UserRecord>],
    existing: &dyn ExistingRecords,
) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    let mut errors = Vec::new();

    for row in rows.iter_mut() {
        let (record, mut issues) = check_row(row);

        if is_valid_email(&record.email) {
            let key = record.email.to_lowercase();
            if !seen.insert(key) {
                issues.push(FieldIssue::new(
                    "email",
                    format!("Duplicate email: {}", record.email),
                ));
            } else if existing.email_exists(&record.email) {
                issues.push(FieldIssue::new(
                    "email",
                    format!("Email already exists in the system: {}", record.email),
                ));
            }
        }

        errors.extend(issues.iter().map(|issue| ValidationError {
            row: row.row_number,
            field: issue.field.clone(),
            message: issue.message.clone(),
            kind: RecordKind::User,
        }));
        row.record = record;
        row.settle(issues.into_iter().map(|issue| issue.message).collect());
    }

    errors
}

/// Check preconditions, parse and validate a user CSV
pub fn parse_users(
    file: &ImportFile,
    existing: &dyn ExistingRecords,
) -> Result<Dataset<UserRecord>, ImportError> {
    let table = open(file, RecordKind::User)?;

    let mut rows: Vec<_> = table
        .records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            ImportRow::new(i + 1, table.field_map(record), UserRecord::default())
                .with_open_quote(table.unterminated_column(record))
        })
        .collect();
    let errors = validate_user_rows(&mut rows, existing);

    let dataset = Dataset {
        file_name: file.name.clone(),
        headers: table.headers,
        rows,
        errors,
    };
    debug!(
        file = %dataset.file_name,
        rows = dataset.rows.len(),
        valid = dataset.valid_count(),
        "Parsed user file"
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::directory::StaticDirectory;

    fn parse(body: &str) -> Dataset<UserRecord> {
        parse_users(&ImportFile::new("users.csv", body), &StaticDirectory::empty()).unwrap()
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("jane.doe@school.edu"));
        assert!(!is_valid_email("jane.doe@school"));
        assert!(!is_valid_email("jane doe@school.edu"));
        assert!(!is_valid_email("@school.edu"));
    }

    #[test]
    fn test_valid_row_defaults() {
        let data = parse("name,email\nJane Doe,jane@school.edu\n");
        let row = &data.rows[0];
        assert!(row.is_valid);
        assert!(row.is_selected);
        assert_eq!(row.record.role, RoleAssignment::Builtin(Role::Creator));
        assert!(row.record.phone.is_none());
        assert!(row.record.permissions.is_empty());
    }

    #[test]
    fn test_name_length() {
        let long = "x".repeat(61);
        let data = parse(&format!("name,email\nJ,a@b.co\n{long},c@d.co\n"));
        assert_eq!(
            data.rows[0].errors,
            vec!["Name must be between 2 and 60 characters"]
        );
        assert!(!data.rows[1].is_valid);
    }

    #[test]
    fn test_phone_format() {
        let data = parse("name,email,phone\nJane,a@b.co,+1 (555) 010-2030\nJohn,c@d.co,call me\n");
        assert!(data.rows[0].is_valid);
        assert_eq!(data.rows[1].errors, vec!["Invalid phone number format"]);
        assert_eq!(data.errors[0].field, "phone");
        assert_eq!(data.errors[0].row, 2);
    }

    #[test]
    fn test_role_names() {
        let data = parse(
            "name,email,role\nA1,a@b.co,reviewer\nB1,b@b.co,super admin\nC1,c@b.co,Content Lead\n",
        );
        assert_eq!(data.rows[0].record.role, RoleAssignment::Builtin(Role::Reviewer));
        assert_eq!(data.rows[1].record.role, RoleAssignment::Builtin(Role::SuperAdmin));
        assert_eq!(
            data.rows[2].record.role,
            RoleAssignment::Custom("Content Lead".into())
        );
        assert!(data.rows.iter().all(|row| row.is_valid));
    }

    #[test]
    fn test_malformed_permissions_is_row_error() {
        let data = parse("name,email,permissions\nJane,a@b.co,{not json\nJohn,c@d.co,\"[1,2]\"\n");
        for row in &data.rows {
            assert_eq!(row.errors, vec!["Permissions must be a valid JSON object"]);
        }
    }

    #[test]
    fn test_existing_email_flagged() {
        let dir = StaticDirectory::new(["jane@school.edu"], Vec::<String>::new());
        let file = ImportFile::new("users.csv", "name,email\nJane,JANE@school.edu\n");
        let data = parse_users(&file, &dir).unwrap();
        assert_eq!(
            data.rows[0].errors,
            vec!["Email already exists in the system: JANE@school.edu"]
        );
    }

    #[test]
    fn test_malformed_email_not_tracked_for_duplicates() {
        let data = parse("name,email\nJane,bad\nJohn,bad\n");
        assert_eq!(data.rows[1].errors, vec!["Invalid email format"]);
    }

    #[test]
    fn test_multiple_errors_accumulate() {
        let data = parse("name,email,phone\n,,abc\n");
        assert_eq!(data.rows[0].errors.len(), 3);
        assert_eq!(data.errors.len(), 3);
    }
}
