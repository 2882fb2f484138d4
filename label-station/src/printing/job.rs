//! Print job model and state machine
//!
//! ```text
//! Created -> Rendering -> Dispatching -> Dispatched -> CleanupPending -> CleanedUp
//!                |             |                             |      \-> CleanupFailed
//!                |             \-> Failed --------------------/
//!                |-> Failed
//!                \-> Abandoned ---------------------------> CleanupPending
//! ```
//!
//! `Dispatched` and `Failed` are what the caller is told; cleanup runs on its
//! own and never changes that answer.

use crate::labels::{LabelRecord, LabelTag};
use crate::utils::{AppError, AppResult};
use chrono::Utc;
use label_printer::CopyStrategy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

pub const MAX_COPIES: u32 = 999;

/// What the operator asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintRequest {
    /// Code of the stored label
    pub code: String,
    pub copies: u32,
    /// `None` uses the configured strategy
    pub strategy: Option<CopyStrategy>,
    /// `None` uses the configured printer, then the system default
    pub printer: Option<String>,
    pub tag: Option<LabelTag>,
}

impl PrintRequest {
    pub fn new(code: impl Into<String>, copies: u32) -> Self {
        Self {
            code: code.into(),
            copies,
            strategy: None,
            printer: None,
            tag: None,
        }
    }

    pub fn with_strategy(mut self, strategy: CopyStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_printer(mut self, printer: impl Into<String>) -> Self {
        self.printer = Some(printer.into());
        self
    }

    pub fn with_tag(mut self, tag: LabelTag) -> Self {
        self.tag = Some(tag);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Created,
    Rendering,
    Dispatching,
    Dispatched,
    CleanupPending,
    CleanedUp,
    CleanupFailed,
    Failed,
    Abandoned,
}

impl JobState {
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Created, Rendering)
                | (Rendering, Dispatching)
                | (Rendering, Failed)
                | (Rendering, Abandoned)
                | (Dispatching, Dispatched)
                | (Dispatching, Failed)
                | (Dispatched, CleanupPending)
                | (Failed, CleanupPending)
                | (Abandoned, CleanupPending)
                | (CleanupPending, CleanedUp)
                | (CleanupPending, CleanupFailed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::CleanedUp | JobState::CleanupFailed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: Uuid,
    pub from: JobState,
    pub to: JobState,
    /// Unix milliseconds
    pub at: i64,
}

impl JobEvent {
    pub fn new(job_id: Uuid, from: JobState, to: JobState) -> Self {
        Self {
            job_id,
            from,
            to,
            at: Utc::now().timestamp_millis(),
        }
    }
}

/// One print request in flight
#[derive(Debug, Clone)]
pub struct PrintJob {
    pub id: Uuid,
    pub record: LabelRecord,
    pub copies: u32,
    pub strategy: CopyStrategy,
    pub printer: Option<String>,
    pub tag: Option<LabelTag>,
    /// Owned exclusively by this job until cleanup
    pub pdf_path: Option<PathBuf>,
    state: JobState,
}

impl PrintJob {
    pub fn new(
        record: LabelRecord,
        copies: u32,
        strategy: CopyStrategy,
        printer: Option<String>,
        tag: Option<LabelTag>,
    ) -> AppResult<Self> {
        if !(1..=MAX_COPIES).contains(&copies) {
            return Err(AppError::invalid(format!(
                "Copies must be between 1 and {}.",
                MAX_COPIES
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            record,
            copies,
            strategy,
            printer: printer.filter(|p| !p.trim().is_empty()),
            tag,
            pdf_path: None,
            state: JobState::Created,
        })
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Move to `next`, returning the event describing the change
    pub fn transition(&mut self, next: JobState) -> AppResult<JobEvent> {
        if !self.state.can_transition_to(next) {
            return Err(AppError::invalid(format!(
                "print job {} cannot go from {} to {}",
                self.id, self.state, next
            )));
        }
        let event = JobEvent::new(self.id, self.state, next);
        self.state = next;
        Ok(event)
    }

    /// Pages the rendered document needs for this job's strategy
    pub fn pages(&self) -> u32 {
        self.strategy.pages_per_document(self.copies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::LabelFields;

    fn job(copies: u32, strategy: CopyStrategy) -> AppResult<PrintJob> {
        let record = LabelRecord {
            code: "AUTO-0001".into(),
            created_at: 0,
            fields: LabelFields::new(),
        };
        PrintJob::new(record, copies, strategy, Some("  ".into()), None)
    }

    #[test]
    fn test_copies_bounds() {
        assert!(job(0, CopyStrategy::Loop).is_err());
        assert!(job(1000, CopyStrategy::Loop).is_err());
        assert!(job(999, CopyStrategy::Loop).is_ok());
    }

    #[test]
    fn test_blank_printer_is_default() {
        assert_eq!(job(1, CopyStrategy::Loop).unwrap().printer, None);
    }

    #[test]
    fn test_pages_follow_strategy() {
        assert_eq!(job(3, CopyStrategy::Loop).unwrap().pages(), 1);
        assert_eq!(job(3, CopyStrategy::DuplicatePages).unwrap().pages(), 3);
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = job(1, CopyStrategy::Loop).unwrap();
        for next in [
            JobState::Rendering,
            JobState::Dispatching,
            JobState::Dispatched,
            JobState::CleanupPending,
            JobState::CleanedUp,
        ] {
            let event = job.transition(next).unwrap();
            assert_eq!(event.to, next);
            assert_eq!(event.job_id, job.id);
        }
        assert!(job.state().is_terminal());
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut job = job(1, CopyStrategy::Loop).unwrap();
        assert!(job.transition(JobState::Dispatching).is_err());
        assert_eq!(job.state(), JobState::Created);

        job.transition(JobState::Rendering).unwrap();
        job.transition(JobState::Dispatching).unwrap();
        assert!(job.transition(JobState::Abandoned).is_err());
        job.transition(JobState::Failed).unwrap();
        assert!(job.transition(JobState::Dispatched).is_err());
        job.transition(JobState::CleanupPending).unwrap();
    }
}
