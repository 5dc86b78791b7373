//! Role CSV rows
//!
//! Any header starting with one of [`PERMISSION_PREFIXES`] is a boolean
//! permission column whose cells hold `X` or nothing.

use crate::access_control::Role;
use crate::error::ImportError;
use crate::import::directory::ExistingRecords;
use crate::import::file::{ImportFile, open};
use crate::import::types::{
    Dataset, FieldIssue, ImportRow, RecordKind, RoleRecord, ValidationError,
};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Module prefixes that mark a permission column
pub const PERMISSION_PREFIXES: [&str; 5] = ["cms_", "lms_", "usermgmt_", "export_", "tagging_"];

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 60;
const DESCRIPTION_MAX: usize = 500;

/// Whether a header names a permission column
pub fn is_permission_column(header: &str) -> bool {
    PERMISSION_PREFIXES
        .iter()
        .any(|prefix| header.starts_with(prefix))
}

/// Build the typed record; permission cells are checked in `headers` order
fn check_row(row: &ImportRow<RoleRecord>, headers: &[String]) -> (RoleRecord, Vec<FieldIssue>) {
    let mut issues: Vec<FieldIssue> = row.quoting_issue().into_iter().collect();

    let name = row.field("role_name").trim().to_string();
    if name.is_empty() {
        issues.push(FieldIssue::new("role_name", "Role name is required"));
    } else if !(NAME_MIN..=NAME_MAX).contains(&name.chars().count()) {
        issues.push(FieldIssue::new(
            "role_name",
            format!("Role name must be between {NAME_MIN} and {NAME_MAX} characters"),
        ));
    }

    let description = row.field("role_description").trim();
    if description.chars().count() > DESCRIPTION_MAX {
        issues.push(FieldIssue::new(
            "role_description",
            format!("Role description must not exceed {DESCRIPTION_MAX} characters"),
        ));
    }

    let mut permissions = BTreeMap::new();
    for column in headers.iter().filter(|h| is_permission_column(h)) {
        if permissions.contains_key(column) {
            continue;
        }
        match row.field(column) {
            "X" => {
                permissions.insert(column.clone(), true);
            }
            "" => {
                permissions.insert(column.clone(), false);
            }
            other => issues.push(FieldIssue::new(
                column.as_str(),
                format!("Invalid value '{other}' in column '{column}' (use 'X' or leave empty)"),
            )),
        }
    }

    if issues.is_empty() && !permissions.values().any(|granted| *granted) {
        issues.push(FieldIssue::new(
            "permissions",
            "At least one permission must be assigned",
        ));
    }

    let record = RoleRecord {
        name,
        description: (!description.is_empty()).then(|| description.to_string()),
        permissions,
    };
    (record, issues)
}

/// Validate every role row from its raw fields. Idempotent.
///
/// `headers` is the file's column order, which is also the order cell
/// errors are reported in.
pub fn validate_role_rows(
    rows: &mut [ImportRow<RoleRecord>],
    headers: &[String],
    existing: &dyn ExistingRecords,
) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    let mut errors = Vec::new();

    for row in rows.iter_mut() {
        let (record, mut issues) = check_row(row, headers);

        if !record.name.is_empty() {
            let name = &record.name;
            if !seen.insert(name.to_lowercase()) {
                issues.push(FieldIssue::new(
                    "role_name",
                    format!("Duplicate role name: {name}"),
                ));
            } else if Role::from_name(name).is_some() {
                issues.push(FieldIssue::new(
                    "role_name",
                    format!("Role '{name}' conflicts with a built-in role"),
                ));
            } else if existing.role_exists(name) {
                issues.push(FieldIssue::new(
                    "role_name",
                    format!("Role '{name}' already exists in the system"),
                ));
            }
        }

        errors.extend(issues.iter().map(|issue| ValidationError {
            row: row.row_number,
            field: issue.field.clone(),
            message: issue.message.clone(),
            kind: RecordKind::Role,
        }));
        row.record = record;
        row.settle(issues.into_iter().map(|issue| issue.message).collect());
    }

    errors
}

/// Check preconditions, parse and validate a role CSV
pub fn parse_roles(
    file: &ImportFile,
    existing: &dyn ExistingRecords,
) -> Result<Dataset<RoleRecord>, ImportError> {
    let table = open(file, RecordKind::Role)?;

    let mut rows: Vec<_> = table
        .records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            ImportRow::new(i + 1, table.field_map(record), RoleRecord::default())
                .with_open_quote(table.unterminated_column(record))
        })
        .collect();
    let errors = validate_role_rows(&mut rows, &table.headers, existing);

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
        "Parsed role file"
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::directory::StaticDirectory;

    fn parse(body: &str) -> Dataset<RoleRecord> {
        parse_roles(&ImportFile::new("roles.csv", body), &StaticDirectory::empty()).unwrap()
    }

    #[test]
    fn test_permission_columns() {
        assert!(is_permission_column("cms_edit"));
        assert!(is_permission_column("usermgmt_manage"));
        assert!(!is_permission_column("role_name"));
        assert!(!is_permission_column("notes"));
    }

    #[test]
    fn test_valid_role() {
        let data = parse(
            "role_name,role_description,cms_view,lms_view\nContent Lead,Leads content,X,\n",
        );
        let row = &data.rows[0];
        assert!(row.is_valid, "{:?}", row.errors);
        assert_eq!(row.record.granted().collect::<Vec<_>>(), vec!["cms_view"]);
        assert_eq!(row.record.description.as_deref(), Some("Leads content"));
    }

    #[test]
    fn test_invalid_cell_names_column() {
        let data = parse("role_name,cms_view,cms_edit\nEditor Plus,yes,X\n");
        assert_eq!(
            data.rows[0].errors,
            vec!["Invalid value 'yes' in column 'cms_view' (use 'X' or leave empty)"]
        );
        assert_eq!(data.errors[0].field, "cms_view");
    }

    #[test]
    fn test_cell_errors_follow_column_order() {
        let data = parse("role_name,lms_view,cms_edit,export_data\nEditor Plus,yes,no,X\n");
        let fields: Vec<_> = data.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["lms_view", "cms_edit"]);
        assert_eq!(
            data.rows[0].errors[0],
            "Invalid value 'yes' in column 'lms_view' (use 'X' or leave empty)"
        );
    }

    #[test]
    fn test_open_quote_is_a_row_error() {
        let data = parse("role_name,role_description,cms_view\nEditor Plus,\"Leads, X\n");
        let row = &data.rows[0];
        assert!(!row.is_valid);
        assert_eq!(data.errors[0].field, "role_description");
        assert!(row.errors[0].contains("missing its closing quote"));
    }

    #[test]
    fn test_lowercase_x_is_rejected() {
        let data = parse("role_name,cms_view\nEditor Plus,x\n");
        assert!(!data.rows[0].is_valid);
    }

    #[test]
    fn test_no_permission_rule_skipped_when_other_errors() {
        let data = parse("role_name,cms_view\nE,\n");
        assert_eq!(
            data.rows[0].errors,
            vec!["Role name must be between 2 and 60 characters"]
        );
    }

    #[test]
    fn test_description_limit() {
        let long = "d".repeat(501);
        let data = parse(&format!("role_name,role_description,cms_view\nEditor Plus,{long},X\n"));
        assert_eq!(
            data.rows[0].errors,
            vec!["Role description must not exceed 500 characters"]
        );
    }

    #[test]
    fn test_duplicate_and_builtin_names() {
        let data = parse("role_name,cms_view\nEditor Plus,X\nEDITOR PLUS,X\nReviewer,X\n");
        assert!(data.rows[0].is_valid);
        assert_eq!(data.rows[1].errors, vec!["Duplicate role name: EDITOR PLUS"]);
        assert_eq!(
            data.rows[2].errors,
            vec!["Role 'Reviewer' conflicts with a built-in role"]
        );
    }

    #[test]
    fn test_existing_role_flagged() {
        let dir = StaticDirectory::new(Vec::<String>::new(), ["Content Lead"]);
        let file = ImportFile::new("roles.csv", "role_name,cms_view\ncontent lead,X\n");
        let data = parse_roles(&file, &dir).unwrap();
        assert_eq!(
            data.rows[0].errors,
            vec!["Role 'content lead' already exists in the system"]
        );
    }
}
