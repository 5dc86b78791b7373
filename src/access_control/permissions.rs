//! Static role permission table
//!
//! Every role maps to one fixed, fully populated [`PermissionSet`]. The table
//! is plain constant data; nothing here is computed or mutated at runtime.

use crate::access_control::types::{PermissionKey, Repository, Role};
use serde::Serialize;

/// Capabilities granted to a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PermissionSet {
    pub access_public_repository: bool,
    pub access_private_repository: bool,
    pub create_content: bool,
    pub edit_content: bool,
    pub delete_content: bool,
    pub manage_users: bool,
    pub view_audit_logs: bool,
    pub export_content: bool,
    pub import_content: bool,
    pub create_test_paper_from_csv: bool,
    pub digitize_content: bool,
    pub manage_ocr_templates: bool,
    pub use_visual_editor: bool,
}

const NONE: PermissionSet = PermissionSet {
    access_public_repository: false,
    access_private_repository: false,
    create_content: false,
    edit_content: false,
    delete_content: false,
    manage_users: false,
    view_audit_logs: false,
    export_content: false,
    import_content: false,
    create_test_paper_from_csv: false,
    digitize_content: false,
    manage_ocr_templates: false,
    use_visual_editor: false,
};

const SUPER_ADMIN: PermissionSet = PermissionSet {
    access_public_repository: true,
    access_private_repository: true,
    create_content: true,
    edit_content: true,
    delete_content: true,
    manage_users: true,
    view_audit_logs: true,
    export_content: true,
    import_content: true,
    create_test_paper_from_csv: true,
    digitize_content: true,
    manage_ocr_templates: true,
    use_visual_editor: true,
};

// Admin can edit but not delete, and cannot export.
const ADMIN: PermissionSet = PermissionSet {
    delete_content: false,
    export_content: false,
    ..SUPER_ADMIN
};

const REVIEWER: PermissionSet = PermissionSet {
    access_public_repository: true,
    edit_content: true,
    digitize_content: true,
    use_visual_editor: true,
    ..NONE
};

const CREATOR: PermissionSet = PermissionSet {
    access_public_repository: true,
    create_content: true,
    edit_content: true,
    create_test_paper_from_csv: true,
    digitize_content: true,
    use_visual_editor: true,
    ..NONE
};

const TRANSLATOR: PermissionSet = PermissionSet {
    access_public_repository: true,
    edit_content: true,
    digitize_content: true,
    use_visual_editor: true,
    ..NONE
};

impl PermissionSet {
    /// Look up a single capability
    pub const fn get(&self, key: PermissionKey) -> bool {
        match key {
            PermissionKey::AccessPublicRepository => self.access_public_repository,
            PermissionKey::AccessPrivateRepository => self.access_private_repository,
            PermissionKey::CreateContent => self.create_content,
            PermissionKey::EditContent => self.edit_content,
            PermissionKey::DeleteContent => self.delete_content,
            PermissionKey::ManageUsers => self.manage_users,
            PermissionKey::ViewAuditLogs => self.view_audit_logs,
            PermissionKey::ExportContent => self.export_content,
            PermissionKey::ImportContent => self.import_content,
            PermissionKey::CreateTestPaperFromCsv => self.create_test_paper_from_csv,
            PermissionKey::DigitizeContent => self.digitize_content,
            PermissionKey::ManageOcrTemplates => self.manage_ocr_templates,
            PermissionKey::UseVisualEditor => self.use_visual_editor,
        }
    }

    /// All capabilities with their values, in key order
    pub fn iter(&self) -> impl Iterator<Item = (PermissionKey, bool)> + '_ {
        PermissionKey::all().iter().map(|key| (*key, self.get(*key)))
    }

    /// Keys that are granted
    pub fn granted(&self) -> Vec<PermissionKey> {
        self.iter()
            .filter_map(|(key, granted)| granted.then_some(key))
            .collect()
    }
}

/// Fixed capability set for a role.
///
/// Total over [`Role`]; [`Role::Anonymous`] yields the all-false set.
pub const fn permissions_for(role: Role) -> &'static PermissionSet {
    match role {
        Role::SuperAdmin => &SUPER_ADMIN,
        Role::Admin => &ADMIN,
        Role::Reviewer => &REVIEWER,
        Role::Creator => &CREATOR,
        Role::Translator => &TRANSLATOR,
        Role::Anonymous => &NONE,
    }
}

/// Whether `role` may open `repository`
pub const fn can_access_repository(role: Role, repository: Repository) -> bool {
    let permissions = permissions_for(role);
    match repository {
        Repository::Public => permissions.access_public_repository,
        Repository::Private => permissions.access_private_repository,
    }
}

/// Whether `role` holds `key`
pub const fn has_permission(role: Role, key: PermissionKey) -> bool {
    permissions_for(role).get(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_super_admin_has_everything() {
        assert!(permissions_for(Role::SuperAdmin).iter().all(|(_, v)| v));
    }

    #[test]
    fn test_anonymous_has_nothing() {
        assert!(permissions_for(Role::Anonymous).granted().is_empty());
    }

    #[test]
    fn test_admin_differs_from_super_admin_by_delete_and_export() {
        let admin = permissions_for(Role::Admin);
        let missing: Vec<_> = admin
            .iter()
            .filter_map(|(key, granted)| (!granted).then_some(key))
            .collect();
        assert_eq!(
            missing,
            vec![PermissionKey::DeleteContent, PermissionKey::ExportContent]
        );
    }

    #[test]
    fn test_reviewer_can_edit_but_not_create() {
        assert!(has_permission(Role::Reviewer, PermissionKey::EditContent));
        assert!(!has_permission(Role::Reviewer, PermissionKey::CreateContent));
    }

    #[test]
    fn test_lookup_is_deterministic() {
        for role in Role::CANONICAL {
            assert_eq!(permissions_for(role), permissions_for(role));
        }
    }

    #[test]
    fn test_serializes_snake_case_keys() {
        let value = serde_json::to_value(permissions_for(Role::Creator)).unwrap();
        assert_eq!(value["create_test_paper_from_csv"], true);
        assert_eq!(value["access_private_repository"], false);
        assert_eq!(value.as_object().unwrap().len(), PermissionKey::all().len());
    }
}
