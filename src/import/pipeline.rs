//! Commit pipeline
//!
//! Writes a snapshot of valid, selected rows to an [`ImportStore`], roles
//! strictly before users, and can later undo exactly what it wrote.
//!
//! Failure handling:
//! - A rejected or timed-out row is recorded as failed and the batch goes on
//! - A fatal store error (unavailable backend) stops the batch as `failed`
//! - Exhausting the batch time budget stops the batch as `failed`
//! - Cancellation is honoured between rows and stops the batch as `cancelled`
//!
//! Rows committed before a stop stay committed and can be rolled back.

use crate::audit::{AuditAction, AuditEvent, AuditOutcome, AuditSink};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, StoreError, StoreResult};
use crate::import::status::{ImportState, ImportStatus};
use crate::import::store::{CommittedRecord, ImportStore};
use crate::import::types::{Dataset, ImportRow, RecordKind, RoleRecord, UserRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Time budgets for a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Upper bound for a single store call
    pub row_timeout: Duration,
    /// Upper bound for the whole batch
    pub batch_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            row_timeout: Duration::from_millis(config.row_timeout_ms),
            batch_timeout: Duration::from_secs(config.batch_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// User-facing message emitted after a major pipeline transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl Notification {
    fn new(title: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
        }
    }
}

/// Events sent to the caller while a commit runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Status snapshot after every state change and every row
    Progress(ImportStatus),
    Notice(Notification),
}

pub type EventSender = mpsc::UnboundedSender<PipelineEvent>;

/// A row the store did not accept
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub kind: RecordKind,
    pub row_number: usize,
    pub key: String,
    pub reason: String,
}

/// Outcome of one commit. `committed` is the receipt used by rollback.
#[derive(Debug, Clone, Serialize)]
pub struct CommitReport {
    pub status: ImportStatus,
    pub committed: Vec<CommittedRecord>,
    pub failures: Vec<RowFailure>,
}

#[derive(Debug, Clone)]
struct BatchRow<T> {
    row_number: usize,
    record: T,
}

impl<T: Clone> BatchRow<T> {
    fn snapshot(rows: &[ImportRow<T>]) -> Vec<Self> {
        rows.iter()
            .filter(|row| row.is_valid && row.is_selected)
            .map(|row| BatchRow {
                row_number: row.row_number,
                record: row.record.clone(),
            })
            .collect()
    }
}

/// Rows frozen for commit
#[derive(Debug, Clone, Default)]
pub struct CommitBatch {
    user_file: Option<String>,
    role_file: Option<String>,
    roles: Vec<BatchRow<RoleRecord>>,
    users: Vec<BatchRow<UserRecord>>,
}

impl CommitBatch {
    pub(crate) fn from_datasets(
        users: Option<&Dataset<UserRecord>>,
        roles: Option<&Dataset<RoleRecord>>,
    ) -> Self {
        Self {
            user_file: users.map(|d| d.file_name.clone()),
            role_file: roles.map(|d| d.file_name.clone()),
            roles: roles.map(|d| BatchRow::snapshot(&d.rows)).unwrap_or_default(),
            users: users.map(|d| BatchRow::snapshot(&d.rows)).unwrap_or_default(),
        }
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn len(&self) -> usize {
        self.roles.len() + self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Roles first, then users
    fn items(&self) -> impl Iterator<Item = BatchItem<'_>> {
        self.roles
            .iter()
            .map(BatchItem::Role)
            .chain(self.users.iter().map(BatchItem::User))
    }
}

enum BatchItem<'a> {
    Role(&'a BatchRow<RoleRecord>),
    User(&'a BatchRow<UserRecord>),
}

impl BatchItem<'_> {
    fn kind(&self) -> RecordKind {
        match self {
            BatchItem::Role(_) => RecordKind::Role,
            BatchItem::User(_) => RecordKind::User,
        }
    }

    fn row_number(&self) -> usize {
        match self {
            BatchItem::Role(row) => row.row_number,
            BatchItem::User(row) => row.row_number,
        }
    }

    fn key(&self) -> &str {
        match self {
            BatchItem::Role(row) => &row.record.name,
            BatchItem::User(row) => &row.record.email,
        }
    }
}

/// Marks the pipeline busy for as long as it lives
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, PipelineError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PipelineError::AlreadyRunning)?;
        Ok(Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn emit(events: Option<&EventSender>, event: PipelineEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is watching
        let _ = tx.send(event);
    }
}

/// Commits batches to a store and rolls them back
pub struct CommitPipeline<S: ImportStore + ?Sized> {
    store: Arc<S>,
    settings: PipelineSettings,
    audit: Arc<dyn AuditSink>,
    actor: String,
    running: AtomicBool,
}

impl<S: ImportStore + ?Sized> CommitPipeline<S> {
    pub fn new(
        store: Arc<S>,
        settings: PipelineSettings,
        audit: Arc<dyn AuditSink>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            store,
            settings,
            audit,
            actor: actor.into(),
            running: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Commit `batch`.
    ///
    /// Only one run or rollback may be in flight per pipeline; a second call
    /// fails with [`PipelineError::AlreadyRunning`].
    pub async fn run(
        &self,
        batch: &CommitBatch,
        events: Option<EventSender>,
        cancel: CancellationToken,
    ) -> Result<CommitReport, PipelineError> {
        let _guard = RunGuard::acquire(&self.running)?;
        if batch.is_empty() {
            return Err(PipelineError::EmptyBatch);
        }
        let events = events.as_ref();

        let mut status = ImportStatus::new(
            batch.user_file.clone(),
            batch.role_file.clone(),
            batch.len(),
            Utc::now(),
        );
        emit(events, PipelineEvent::Progress(status.clone()));

        status.transition(ImportState::Processing)?;
        info!(
            import_id = %status.id,
            roles = batch.role_count(),
            users = batch.user_count(),
            "Starting import commit"
        );
        emit(events, PipelineEvent::Progress(status.clone()));
        emit(
            events,
            PipelineEvent::Notice(Notification::new(
                "Import started",
                format!(
                    "Committing {} roles and {} users",
                    batch.role_count(),
                    batch.user_count()
                ),
                Severity::Info,
            )),
        );

        let deadline = Instant::now() + self.settings.batch_timeout;
        let mut committed = Vec::new();
        let mut failures = Vec::new();
        let mut stop: Option<(ImportState, String)> = None;

        for item in batch.items() {
            if cancel.is_cancelled() {
                info!(import_id = %status.id, "Import cancelled");
                stop = Some((
                    ImportState::Cancelled,
                    format!(
                        "Cancelled after {} of {} rows",
                        status.processed_rows, status.total_rows
                    ),
                ));
                break;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                stop = Some((ImportState::Failed, self.batch_timeout_message()));
                break;
            }

            let budget = remaining.min(self.settings.row_timeout);
            let result = match tokio::time::timeout(budget, self.insert(&item)).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout {
                    timeout_ms: budget.as_millis() as u64,
                }),
            };

            match result {
                Ok(id) => {
                    debug!(kind = %item.kind(), row = item.row_number(), %id, "Row committed");
                    committed.push(CommittedRecord {
                        id,
                        kind: item.kind(),
                        key: item.key().to_string(),
                        row_number: item.row_number(),
                    });
                    status.record_row(true);
                }
                Err(e) => {
                    warn!(
                        kind = %item.kind(),
                        row = item.row_number(),
                        key = item.key(),
                        error = %e,
                        "Row commit failed"
                    );
                    status.record_row(false);
                    failures.push(RowFailure {
                        kind: item.kind(),
                        row_number: item.row_number(),
                        key: item.key().to_string(),
                        reason: e.to_string(),
                    });
                    if e.is_fatal() {
                        stop = Some((ImportState::Failed, e.to_string()));
                    }
                }
            }
            emit(events, PipelineEvent::Progress(status.clone()));

            if stop.is_some() {
                break;
            }
            if Instant::now() >= deadline {
                stop = Some((ImportState::Failed, self.batch_timeout_message()));
                break;
            }
        }

        let (state, error) = match stop {
            Some((state, reason)) => (state, Some(reason)),
            None => (ImportState::Completed, None),
        };
        status.finish(state, committed.len(), error)?;

        info!(
            import_id = %status.id,
            state = %status.state,
            successful = status.successful_rows,
            failed = status.failed_rows,
            "Import commit finished"
        );

        let outcome = if state == ImportState::Completed {
            AuditOutcome::Success
        } else {
            AuditOutcome::Failure
        };
        self.audit.record(
            AuditEvent::now(
                &self.actor,
                AuditAction::Import,
                &status.id.to_string(),
                outcome,
            )
            .with_detail(format!(
                "{} of {} rows committed, {} failed",
                status.successful_rows, status.total_rows, status.failed_rows
            )),
        );

        emit(events, PipelineEvent::Notice(completion_notice(&status)));
        emit(events, PipelineEvent::Progress(status.clone()));

        Ok(CommitReport {
            status,
            committed,
            failures,
        })
    }

    /// Undo a commit if its rollback window is still open
    pub async fn rollback(&self, report: &mut CommitReport) -> Result<usize, PipelineError> {
        self.rollback_at(report, Utc::now()).await
    }

    /// Undo a commit as of `now`.
    ///
    /// Deletes exactly the records in the report's receipt, newest first.
    /// Records that are already gone count as undone. On any other store
    /// error the remaining receipt is left in the report so the rollback can
    /// be retried.
    pub async fn rollback_at(
        &self,
        report: &mut CommitReport,
        now: DateTime<Utc>,
    ) -> Result<usize, PipelineError> {
        let _guard = RunGuard::acquire(&self.running)?;
        if let Some(reason) = report.status.rollback_unavailable_reason(now) {
            return Err(PipelineError::RollbackUnavailable { reason });
        }

        let import_id = report.status.id.to_string();
        let total = report.committed.len();
        let mut undone = 0;

        let row_timeout = self.settings.row_timeout;
        while let Some(record) = report.committed.last() {
            let delete = self.store.delete(record.kind, record.id);
            let result = match tokio::time::timeout(row_timeout, delete).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout {
                    timeout_ms: row_timeout.as_millis() as u64,
                }),
            };

            match result {
                Ok(()) => {}
                Err(StoreError::NotFound(what)) => {
                    warn!(import_id = %import_id, record = %what, "Record already removed");
                }
                Err(e) => {
                    warn!(import_id = %import_id, error = %e, undone, total, "Rollback stopped");
                    self.audit.record(
                        AuditEvent::now(
                            &self.actor,
                            AuditAction::Rollback,
                            &import_id,
                            AuditOutcome::Failure,
                        )
                        .with_detail(e.to_string()),
                    );
                    return Err(PipelineError::RollbackIncomplete {
                        undone,
                        total,
                        reason: e.to_string(),
                    });
                }
            }
            report.committed.pop();
            undone += 1;
        }

        report.status.mark_rolled_back();
        info!(import_id = %import_id, undone, "Import rolled back");
        self.audit.record(
            AuditEvent::now(
                &self.actor,
                AuditAction::Rollback,
                &import_id,
                AuditOutcome::Success,
            )
            .with_detail(format!("{undone} records removed")),
        );
        Ok(undone)
    }

    async fn insert(&self, item: &BatchItem<'_>) -> StoreResult<Uuid> {
        match item {
            BatchItem::Role(row) => self.store.insert_role(&row.record).await,
            BatchItem::User(row) => self.store.insert_user(&row.record).await,
        }
    }

    fn batch_timeout_message(&self) -> String {
        format!(
            "Batch exceeded its time budget of {} ms",
            self.settings.batch_timeout.as_millis()
        )
    }
}

fn completion_notice(status: &ImportStatus) -> Notification {
    match status.state {
        ImportState::Completed if status.failed_rows == 0 => Notification::new(
            "Import completed",
            format!("{} rows committed", status.successful_rows),
            Severity::Success,
        ),
        ImportState::Completed => Notification::new(
            "Import completed with errors",
            format!(
                "{} rows committed, {} rows failed",
                status.successful_rows, status.failed_rows
            ),
            Severity::Warning,
        ),
        ImportState::Cancelled => Notification::new(
            "Import cancelled",
            format!(
                "{} rows were committed before cancellation",
                status.successful_rows
            ),
            Severity::Warning,
        ),
        _ => Notification::new(
            "Import failed",
            status
                .error
                .clone()
                .unwrap_or_else(|| "The import did not complete".to_string()),
            Severity::Error,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::import::directory::StaticDirectory;
    use crate::import::file::ImportFile;
    use crate::import::session::ImportSession;
    use crate::import::store::MemoryStore;

    fn batch(users: &str, roles: &str) -> CommitBatch {
        let dir = StaticDirectory::empty();
        let mut session = ImportSession::new();
        session
            .load_roles(&ImportFile::new("roles.csv", roles), &dir)
            .unwrap();
        session
            .load_users(&ImportFile::new("users.csv", users), &dir)
            .unwrap();
        session.commit_batch()
    }

    #[test]
    fn test_batch_snapshot_skips_invalid_rows() {
        let batch = batch(
            "name,email,role\nAnn Lee,ann@school.edu,Content Lead\nBob Ray,not-an-email,\n",
            "role_name,cms_view\nContent Lead,X\nBad,\n",
        );
        assert_eq!(batch.role_count(), 1);
        assert_eq!(batch.user_count(), 1);
        let kinds: Vec<_> = batch.items().map(|item| item.kind()).collect();
        assert_eq!(kinds, vec![RecordKind::Role, RecordKind::User]);
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let pipeline = CommitPipeline::new(
            Arc::new(MemoryStore::new()),
            PipelineSettings::default(),
            Arc::new(AuditLog::new()),
            "admin@learnhub.local",
        );
        let err = pipeline
            .run(&CommitBatch::default(), None, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::EmptyBatch);
        assert!(!pipeline.is_running());
    }

    #[tokio::test]
    async fn test_run_emits_notices_and_audits() {
        let audit = Arc::new(AuditLog::new());
        let pipeline = CommitPipeline::new(
            Arc::new(MemoryStore::new()),
            PipelineSettings::default(),
            audit.clone(),
            "admin@learnhub.local",
        );
        let batch = batch(
            "name,email,role\nAnn Lee,ann@school.edu,Content Lead\n",
            "role_name,cms_view\nContent Lead,X\n",
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        let report = pipeline
            .run(&batch, Some(tx), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.status.state, ImportState::Completed);

        let mut notices = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let PipelineEvent::Notice(notice) = event {
                notices.push(notice);
            }
        }
        assert_eq!(notices.first().unwrap().title, "Import started");
        assert_eq!(notices.last().unwrap().severity, Severity::Success);

        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::Import);
        assert_eq!(entries[0].outcome, AuditOutcome::Success);
    }

    #[tokio::test]
    async fn test_rollback_twice_is_refused() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = CommitPipeline::new(
            store.clone(),
            PipelineSettings::default(),
            Arc::new(AuditLog::new()),
            "admin@learnhub.local",
        );
        let batch = batch(
            "name,email\nAnn Lee,ann@school.edu\n",
            "role_name,cms_view\nContent Lead,X\n",
        );
        let mut report = pipeline
            .run(&batch, None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(pipeline.rollback(&mut report).await.unwrap(), 2);
        assert_eq!(store.user_count() + store.role_count(), 0);
        assert!(matches!(
            pipeline.rollback(&mut report).await,
            Err(PipelineError::RollbackUnavailable { .. })
        ));
    }
}
