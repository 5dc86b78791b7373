//! Access control types
//!
//! Roles, capability keys and content repositories.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role assigned to a user at creation
///
/// The five canonical roles come first. `Anonymous` stands for an unknown or
/// unauthenticated principal and is granted nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    SuperAdmin,
    Admin,
    Reviewer,
    Creator,
    Translator,
    #[default]
    Anonymous,
}

impl Role {
    /// The canonical role names, in table order
    pub const CANONICAL: [Role; 5] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::Reviewer,
        Role::Creator,
        Role::Translator,
    ];

    /// Get the role name as a string
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SuperAdmin",
            Role::Admin => "Admin",
            Role::Reviewer => "Reviewer",
            Role::Creator => "Creator",
            Role::Translator => "Translator",
            Role::Anonymous => "Anonymous",
        }
    }

    /// Parse a canonical role name.
    ///
    /// Matching ignores case, spaces, hyphens and underscores, so `super_admin`
    /// and `Super Admin` both resolve to [`Role::SuperAdmin`]. `Anonymous` is
    /// never produced here.
    pub fn from_name(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "superadmin" => Some(Role::SuperAdmin),
            "admin" => Some(Role::Admin),
            "reviewer" => Some(Role::Reviewer),
            "creator" => Some(Role::Creator),
            "translator" => Some(Role::Translator),
            _ => None,
        }
    }

    /// Parse a role name, falling back to [`Role::Anonymous`]
    pub fn from_name_or_anonymous(s: &str) -> Self {
        Self::from_name(s).unwrap_or(Role::Anonymous)
    }

    pub const fn is_canonical(&self) -> bool {
        !matches!(self, Role::Anonymous)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single boolean capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKey {
    AccessPublicRepository,
    AccessPrivateRepository,
    CreateContent,
    EditContent,
    DeleteContent,
    ManageUsers,
    ViewAuditLogs,
    ExportContent,
    ImportContent,
    CreateTestPaperFromCsv,
    DigitizeContent,
    ManageOcrTemplates,
    UseVisualEditor,
}

impl PermissionKey {
    /// Get the permission name as a string
    pub const fn as_str(&self) -> &'static str {
        match self {
            PermissionKey::AccessPublicRepository => "access_public_repository",
            PermissionKey::AccessPrivateRepository => "access_private_repository",
            PermissionKey::CreateContent => "create_content",
            PermissionKey::EditContent => "edit_content",
            PermissionKey::DeleteContent => "delete_content",
            PermissionKey::ManageUsers => "manage_users",
            PermissionKey::ViewAuditLogs => "view_audit_logs",
            PermissionKey::ExportContent => "export_content",
            PermissionKey::ImportContent => "import_content",
            PermissionKey::CreateTestPaperFromCsv => "create_test_paper_from_csv",
            PermissionKey::DigitizeContent => "digitize_content",
            PermissionKey::ManageOcrTemplates => "manage_ocr_templates",
            PermissionKey::UseVisualEditor => "use_visual_editor",
        }
    }

    /// Try to parse a permission from a string
    pub fn try_parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|key| key.as_str() == s)
    }

    /// Get all permission keys
    pub fn all() -> &'static [PermissionKey] {
        &[
            PermissionKey::AccessPublicRepository,
            PermissionKey::AccessPrivateRepository,
            PermissionKey::CreateContent,
            PermissionKey::EditContent,
            PermissionKey::DeleteContent,
            PermissionKey::ManageUsers,
            PermissionKey::ViewAuditLogs,
            PermissionKey::ExportContent,
            PermissionKey::ImportContent,
            PermissionKey::CreateTestPaperFromCsv,
            PermissionKey::DigitizeContent,
            PermissionKey::ManageOcrTemplates,
            PermissionKey::UseVisualEditor,
        ]
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named content partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Repository {
    Public,
    Private,
}

impl Repository {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Repository::Public => "Public",
            Repository::Private => "Private",
        }
    }

    /// The capability that gates this repository
    pub const fn permission(&self) -> PermissionKey {
        match self {
            Repository::Public => PermissionKey::AccessPublicRepository,
            Repository::Private => PermissionKey::AccessPrivateRepository,
        }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_name_roundtrip() {
        for role in Role::CANONICAL {
            assert_eq!(Role::from_name(role.as_str()), Some(role));
        }
    }

    #[test]
    fn test_role_name_spellings() {
        assert_eq!(Role::from_name("super_admin"), Some(Role::SuperAdmin));
        assert_eq!(Role::from_name("Super Admin"), Some(Role::SuperAdmin));
        assert_eq!(Role::from_name("  creator "), Some(Role::Creator));
        assert_eq!(Role::from_name("anonymous"), None);
        assert_eq!(Role::from_name("Editor"), None);
        assert_eq!(Role::from_name_or_anonymous("Editor"), Role::Anonymous);
    }

    #[test]
    fn test_permission_key_roundtrip() {
        for key in PermissionKey::all() {
            assert_eq!(PermissionKey::try_parse(key.as_str()), Some(*key));
        }
        assert_eq!(PermissionKey::all().len(), 13);
    }

    #[test]
    fn test_repository_permission() {
        assert_eq!(
            Repository::Public.permission(),
            PermissionKey::AccessPublicRepository
        );
        assert_eq!(
            Repository::Private.permission(),
            PermissionKey::AccessPrivateRepository
        );
    }
}
