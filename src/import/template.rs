//! Downloadable CSV templates

use crate::import::csv::join_record;
use crate::import::user_rows::USER_HEADERS;

/// Permission columns offered by the role template
pub const ROLE_PERMISSION_COLUMNS: [&str; 12] = [
    "cms_view",
    "cms_create",
    "cms_edit",
    "cms_delete",
    "lms_view",
    "lms_assign",
    "usermgmt_view",
    "usermgmt_manage",
    "export_csv",
    "export_pdf",
    "tagging_view",
    "tagging_edit",
];

/// User template: header plus sample rows
pub fn user_template() -> String {
    let rows: [[&str; 5]; 3] = [
        [
            "Jane Doe",
            "jane.doe@school.edu",
            "+1 (555) 010-2030",
            "Creator",
            r#"{"cms_create": true, "cms_edit": true}"#,
        ],
        ["John Smith", "john.smith@school.edu", "", "Reviewer", ""],
        [
            "Maria Garcia",
            "maria.garcia@school.edu",
            "555-010-4477",
            "Translator",
            r#"{"lms_view": true}"#,
        ],
    ];

    let mut out = join_record(&USER_HEADERS);
    out.push('\n');
    for row in &rows {
        out.push_str(&join_record(row));
        out.push('\n');
    }
    out
}

/// Role template: header plus sample rows
pub fn role_template() -> String {
    let samples: [(&str, &str, &[&str]); 2] = [
        (
            "Content Lead",
            "Creates and edits course content",
            &["cms_view", "cms_create", "cms_edit", "tagging_view", "tagging_edit"],
        ),
        (
            "Exam Coordinator",
            "Assigns assessments and exports results",
            &["lms_view", "lms_assign", "export_csv", "export_pdf"],
        ),
    ];

    let mut header = vec!["role_name", "role_description"];
    header.extend(ROLE_PERMISSION_COLUMNS);

    let mut out = join_record(&header);
    out.push('\n');
    for (name, description, granted) in samples {
        let mut row = vec![name, description];
        row.extend(
            ROLE_PERMISSION_COLUMNS
                .iter()
                .map(|column| if granted.contains(column) { "X" } else { "" }),
        );
        out.push_str(&join_record(&row));
        out.push('\n');
    }
    out
}
