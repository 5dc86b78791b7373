//! Import status state machine
//!
//! ```text
//! Pending -> Processing -> Completed | Failed | Cancelled
//! ```
//!
//! A terminal status only changes afterwards when its batch is rolled back.

use crate::error::PipelineError;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// How long after commit start a batch may be rolled back
pub const ROLLBACK_WINDOW_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportState {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl ImportState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ImportState::Pending => "pending",
            ImportState::Processing => "processing",
            ImportState::Completed => "completed",
            ImportState::Failed => "failed",
            ImportState::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            ImportState::Completed | ImportState::Failed | ImportState::Cancelled
        )
    }

    fn can_transition_to(&self, next: ImportState) -> bool {
        matches!(
            (self, next),
            (ImportState::Pending, ImportState::Processing)
                | (ImportState::Pending, ImportState::Cancelled)
                | (ImportState::Processing, ImportState::Completed)
                | (ImportState::Processing, ImportState::Failed)
                | (ImportState::Processing, ImportState::Cancelled)
        )
    }
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress and outcome of one commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportStatus {
    pub id: Uuid,
    pub user_file: Option<String>,
    pub role_file: Option<String>,
    pub started_at: DateTime<Utc>,
    pub state: ImportState,
    /// Percentage of rows processed, never decreases
    pub progress: u8,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub successful_rows: usize,
    pub failed_rows: usize,
    pub can_rollback: bool,
    pub rollback_deadline: Option<DateTime<Utc>>,
    pub rolled_back: bool,
    /// Reason for a failed or cancelled batch
    pub error: Option<String>,
}

impl ImportStatus {
    pub fn new(
        user_file: Option<String>,
        role_file: Option<String>,
        total_rows: usize,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_file,
            role_file,
            started_at,
            state: ImportState::Pending,
            progress: 0,
            total_rows,
            processed_rows: 0,
            successful_rows: 0,
            failed_rows: 0,
            can_rollback: false,
            rollback_deadline: None,
            rolled_back: false,
            error: None,
        }
    }

    /// Move to `next`, refusing transitions the state machine does not allow
    pub fn transition(&mut self, next: ImportState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    /// Count one processed row and refresh the progress percentage
    pub fn record_row(&mut self, success: bool) {
        if self.processed_rows >= self.total_rows {
            return;
        }
        self.processed_rows += 1;
        if success {
            self.successful_rows += 1;
        } else {
            self.failed_rows += 1;
        }

        let pct = (self.processed_rows as f64 * 100.0 / self.total_rows as f64).round() as u8;
        self.progress = self.progress.max(pct);
    }

    /// Enter a terminal state. Rollback becomes available when anything was committed.
    pub fn finish(
        &mut self,
        state: ImportState,
        committed: usize,
        error: Option<String>,
    ) -> Result<(), PipelineError> {
        self.transition(state)?;
        self.error = error;
        if committed > 0 || state == ImportState::Completed {
            self.can_rollback = committed > 0;
            self.rollback_deadline =
                Some(self.started_at + Duration::minutes(ROLLBACK_WINDOW_MINUTES));
        }
        Ok(())
    }

    pub fn rollback_available(&self, now: DateTime<Utc>) -> bool {
        self.rollback_unavailable_reason(now).is_none()
    }

    /// Why a rollback cannot run at `now`, or `None` if it can
    pub fn rollback_unavailable_reason(&self, now: DateTime<Utc>) -> Option<String> {
        if self.rolled_back {
            return Some("the batch has already been rolled back".to_string());
        }
        if !self.state.is_terminal() {
            return Some(format!("the import is still {}", self.state));
        }
        if !self.can_rollback {
            return Some("no records were committed".to_string());
        }
        match self.rollback_deadline {
            Some(deadline) if now < deadline => None,
            Some(deadline) => Some(format!(
                "the rollback window closed at {}",
                deadline.to_rfc3339()
            )),
            None => Some("no rollback deadline was set".to_string()),
        }
    }

    pub(crate) fn mark_rolled_back(&mut self) {
        self.rolled_back = true;
        self.can_rollback = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processing(total: usize) -> ImportStatus {
        let mut status = ImportStatus::new(None, Some("roles.csv".into()), total, Utc::now());
        status.transition(ImportState::Processing).unwrap();
        status
    }

    #[test]
    fn test_transitions() {
        let mut status = ImportStatus::new(None, None, 1, Utc::now());
        assert!(status.transition(ImportState::Completed).is_err());
        status.transition(ImportState::Processing).unwrap();
        status.transition(ImportState::Completed).unwrap();
        assert_eq!(
            status.transition(ImportState::Processing),
            Err(PipelineError::InvalidTransition {
                from: "completed".into(),
                to: "processing".into()
            })
        );
    }

    #[test]
    fn test_progress_rounds_and_never_exceeds_total() {
        let mut status = processing(3);
        status.record_row(true);
        assert_eq!(status.progress, 33);
        status.record_row(true);
        assert_eq!(status.progress, 67);
        status.record_row(false);
        status.record_row(true);
        assert_eq!(status.progress, 100);
        assert_eq!(status.processed_rows, 3);
        assert_eq!(status.successful_rows + status.failed_rows, 3);
    }

    #[test]
    fn test_finish_sets_rollback_window() {
        let mut status = processing(1);
        status.record_row(true);
        status.finish(ImportState::Completed, 1, None).unwrap();

        let deadline = status.rollback_deadline.unwrap();
        assert_eq!(deadline - status.started_at, Duration::minutes(30));
        assert!(status.rollback_available(status.started_at + Duration::minutes(29)));
        assert!(!status.rollback_available(deadline));
    }

    #[test]
    fn test_nothing_committed_means_no_rollback() {
        let mut status = processing(2);
        status.record_row(false);
        status.record_row(false);
        status.finish(ImportState::Completed, 0, None).unwrap();
        assert!(!status.can_rollback);
        assert_eq!(
            status.rollback_unavailable_reason(Utc::now()).as_deref(),
            Some("no records were committed")
        );
    }

    #[test]
    fn test_failed_batch_with_commits_is_rollback_eligible() {
        let mut status = processing(4);
        status.record_row(true);
        status
            .finish(ImportState::Failed, 1, Some("storage unavailable".into()))
            .unwrap();
        assert!(status.rollback_available(Utc::now()));
    }

    #[test]
    fn test_rollback_only_once() {
        let mut status = processing(1);
        status.record_row(true);
        status.finish(ImportState::Completed, 1, None).unwrap();
        status.mark_rolled_back();
        assert!(!status.rollback_available(Utc::now()));
    }
}
