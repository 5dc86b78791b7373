//! Access control module
//!
//! Role-based access control over a fixed permission table.
//!
//! ## Access Control Model
//!
//! Each [`Role`] maps to exactly one [`PermissionSet`] of thirteen boolean
//! capabilities. The mapping is constant data:
//!
//! | Role | Grants |
//! |---|---|
//! | SuperAdmin | everything |
//! | Admin | everything except `delete_content` and `export_content` |
//! | Reviewer | public repository, edit, digitize, visual editor |
//! | Creator | public repository, create, edit, test paper from CSV, digitize, visual editor |
//! | Translator | public repository, edit, digitize, visual editor |
//! | Anonymous | nothing |
//!
//! The free functions [`permissions_for`], [`can_access_repository`] and
//! [`has_permission`] are pure. [`AccessResolver`] wraps them with decisions,
//! typed errors and audit records for checks that are enforced.

pub mod permissions;
pub mod resolver;
pub mod types;

pub use permissions::{PermissionSet, can_access_repository, has_permission, permissions_for};
pub use resolver::{AccessDecision, AccessResolver};
pub use types::{PermissionKey, Repository, Role};
