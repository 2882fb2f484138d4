//! Delayed removal of rendered PDFs
//!
//! SumatraPDF reads the file some time after it was launched and nobody
//! tells us when it is done, so the file is removed after a fixed delay.
//! A failed removal is retried once after a longer delay, then given up on.

use super::job::{JobEvent, JobState};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_secs(25);
pub const DEFAULT_CLEANUP_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupStatus {
    CleanedUp,
    /// Someone else removed the file first
    AlreadyGone,
    Failed(String),
}

impl CleanupStatus {
    pub fn is_clean(&self) -> bool {
        !matches!(self, CleanupStatus::Failed(_))
    }
}

/// Schedules temp file removal on the tokio runtime
#[derive(Debug, Clone)]
pub struct CleanupScheduler {
    delay: Duration,
    retry_delay: Duration,
    events: Option<mpsc::UnboundedSender<JobEvent>>,
}

impl CleanupScheduler {
    pub fn new(delay: Duration, retry_delay: Duration) -> Self {
        Self {
            delay,
            retry_delay,
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<JobEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Remove `path` after the delay; the job must already be `CleanupPending`
    pub fn schedule(&self, job_id: Uuid, path: PathBuf) -> CleanupHandle {
        let delay = self.delay;
        let retry_delay = self.retry_delay;
        let events = self.events.clone();
        let task_path = path.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let status = remove_with_retry(&task_path, retry_delay).await;

            let next = if status.is_clean() {
                JobState::CleanedUp
            } else {
                JobState::CleanupFailed
            };
            if let Some(tx) = events {
                let _ = tx.send(JobEvent::new(job_id, JobState::CleanupPending, next));
            }
            status
        });

        debug!(job_id = %job_id, path = %path.display(), delay_ms = delay.as_millis() as u64, "cleanup scheduled");
        CleanupHandle { path, handle }
    }
}

impl Default for CleanupScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CLEANUP_DELAY, DEFAULT_CLEANUP_RETRY_DELAY)
    }
}

async fn remove_with_retry(path: &Path, retry_delay: Duration) -> CleanupStatus {
    match remove(path).await {
        Ok(status) => status,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "temp PDF removal failed, retrying later");
            tokio::time::sleep(retry_delay).await;
            match remove(path).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "temp PDF removal failed, giving up");
                    CleanupStatus::Failed(e.to_string())
                }
            }
        }
    }
}

async fn remove(path: &Path) -> std::io::Result<CleanupStatus> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "temp PDF removed");
            Ok(CleanupStatus::CleanedUp)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(CleanupStatus::AlreadyGone),
        Err(e) => Err(e),
    }
}

/// Handle to a scheduled cleanup
///
/// Dropping it does not cancel the cleanup.
#[derive(Debug)]
pub struct CleanupHandle {
    path: PathBuf,
    handle: JoinHandle<CleanupStatus>,
}

impl CleanupHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the cleanup to run
    pub async fn wait(self) -> CleanupStatus {
        match self.handle.await {
            Ok(status) => status,
            Err(e) => CleanupStatus::Failed(e.to_string()),
        }
    }
}
