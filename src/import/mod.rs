//! Bulk CSV import
//!
//! Flow for one import:
//!
//! ```text
//! upload -> preconditions -> parse -> per-file rules -> combined pass -> commit -> (rollback)
//! ```
//!
//! - Preconditions reject a whole file with an [`ImportError`](crate::error::ImportError)
//! - Row rule violations are data: each row keeps its own messages and the
//!   dataset keeps a [`ValidationError`] list
//! - Only rows that are valid and selected are snapshotted into a
//!   [`CommitBatch`] and handed to the [`CommitPipeline`]

mod csv;
pub mod combined;
pub mod directory;
pub mod file;
pub mod pipeline;
pub mod role_rows;
pub mod session;
pub mod status;
pub mod store;
pub mod template;
pub mod types;
pub mod user_rows;

pub use combined::cross_validate;
pub use directory::{ExistingRecords, StaticDirectory};
pub use file::{ImportFile, ImportLimits};
pub use pipeline::{
    CommitBatch, CommitPipeline, CommitReport, EventSender, Notification, PipelineEvent,
    PipelineSettings, RowFailure, Severity,
};
pub use role_rows::{PERMISSION_PREFIXES, is_permission_column, parse_roles, validate_role_rows};
pub use session::{ImportSession, ImportSummary};
pub use status::{ImportState, ImportStatus, ROLLBACK_WINDOW_MINUTES};
pub use store::{CommittedRecord, ImportStore, MemoryStore};
pub use template::{ROLE_PERMISSION_COLUMNS, role_template, user_template};
pub use types::{
    Dataset, ImportRow, RecordKind, RoleAssignment, RoleRecord, UserRecord, ValidationError,
};
pub use user_rows::{
    DEFAULT_USER_ROLE, USER_HEADERS, is_valid_email, parse_users, validate_user_rows,
};
