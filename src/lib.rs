//! learnhub
//!
//! Access control and bulk CSV import for a learning management dashboard.
//!
//! ## Features
//!
//! - **Fixed role permission table** with repository and action checks
//! - **User and role CSV import** with per-row, per-file and cross-file validation
//! - **Commit pipeline** that writes roles before users, reports progress,
//!   honours cancellation and timeouts, and can roll a batch back for 30 minutes
//! - **Audit trail** of access attempts, imports and rollbacks
//!
//! ## Import Flow
//!
//! ```text
//! ImportFile -> ImportSession (validate) -> CommitBatch -> CommitPipeline -> CommitReport
//! ```
//!
//! ## Example Configuration
//!
//! ```toml
//! [pipeline]
//! row_timeout_ms = 5000
//! batch_timeout_secs = 300
//!
//! [directory]
//! emails = ["admin@school.edu"]   # already registered
//! roles = ["Content Lead"]
//!
//! [current_user]
//! name = "Demo Admin"
//! email = "admin@learnhub.local"
//! role = "SuperAdmin"
//! ```

pub mod access_control;
pub mod audit;
pub mod config;
pub mod error;
pub mod import;
pub mod users;

// Re-export main types
pub use access_control::{AccessResolver, PermissionKey, PermissionSet, Repository, Role};
pub use audit::{AuditLog, AuditSink};
pub use config::{AppConfig, load_config};
pub use error::{AppError, Result};
pub use import::{CommitPipeline, ImportFile, ImportSession, MemoryStore};
pub use users::User;
