//! Print pipeline: render -> dispatch -> scheduled cleanup
//!
//! Rendering and dispatching are blocking (PDF writing, process spawning) and
//! run on tokio's blocking pool. Cleanup is scheduled for every file that was
//! written, whether or not dispatch succeeded.

use super::cleanup::{CleanupHandle, CleanupScheduler};
use super::job::{JobEvent, JobState, PrintJob, PrintRequest};
use crate::labels::{LabelRecord, LabelTag};
use crate::utils::{AppError, AppResult};
use label_printer::{CopyStrategy, DispatchReport, LabelRenderer, PrintBackend};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Result of one print request
#[derive(Debug)]
pub struct JobOutcome {
    pub job_id: Uuid,
    /// `Dispatched` on success, otherwise `Failed` or `Abandoned`
    pub state: JobState,
    pub result: AppResult<DispatchReport>,
    /// Present whenever a PDF was written
    pub cleanup: Option<CleanupHandle>,
}

impl JobOutcome {
    pub(crate) fn rejected(error: AppError) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            state: JobState::Failed,
            result: Err(error),
            cleanup: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Orchestrates print jobs
pub struct PrintPipeline {
    renderer: Arc<LabelRenderer>,
    backend: Arc<dyn PrintBackend>,
    cleanup: CleanupScheduler,
    spool_dir: PathBuf,
    default_strategy: CopyStrategy,
    default_printer: Option<String>,
    events: Option<mpsc::UnboundedSender<JobEvent>>,
}

impl PrintPipeline {
    pub fn new(
        renderer: LabelRenderer,
        backend: Arc<dyn PrintBackend>,
        cleanup: CleanupScheduler,
        spool_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            renderer: Arc::new(renderer),
            backend,
            cleanup,
            spool_dir: spool_dir.into(),
            default_strategy: CopyStrategy::default(),
            default_printer: None,
            events: None,
        }
    }

    pub fn with_default_strategy(mut self, strategy: CopyStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn with_default_printer(mut self, printer: Option<String>) -> Self {
        self.default_printer = printer;
        self
    }

    /// Send every state change to `events`, cleanup outcomes included
    pub fn with_events(mut self, events: mpsc::UnboundedSender<JobEvent>) -> Self {
        self.cleanup = self.cleanup.with_events(events.clone());
        self.events = Some(events);
        self
    }

    pub fn spool_dir(&self) -> &Path {
        &self.spool_dir
    }

    /// Build a job for `record`, applying configured defaults
    pub fn prepare(&self, record: LabelRecord, request: &PrintRequest) -> AppResult<PrintJob> {
        PrintJob::new(
            record,
            request.copies,
            request.strategy.unwrap_or(self.default_strategy),
            request
                .printer
                .clone()
                .or_else(|| self.default_printer.clone()),
            request.tag,
        )
    }

    /// Render, dispatch and schedule cleanup
    pub async fn run(&self, record: LabelRecord, request: &PrintRequest) -> JobOutcome {
        self.run_with(record, request, || true).await
    }

    /// Like [`run`](Self::run), but drops the job when `still_wanted`
    /// returns false after rendering
    pub async fn run_with(
        &self,
        record: LabelRecord,
        request: &PrintRequest,
        still_wanted: impl Fn() -> bool,
    ) -> JobOutcome {
        let mut job = match self.prepare(record, request) {
            Ok(job) => job,
            Err(e) => return JobOutcome::rejected(e),
        };
        info!(
            job_id = %job.id,
            code = %job.record.code,
            copies = job.copies,
            strategy = %job.strategy,
            "Print job created"
        );

        self.advance(&mut job, JobState::Rendering);
        let path = match self.render(&job).await {
            Ok(path) => path,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Label render failed");
                self.advance(&mut job, JobState::Failed);
                return self.finish(job, Err(e), None);
            }
        };
        job.pdf_path = Some(path.clone());

        if !still_wanted() {
            warn!(job_id = %job.id, "Caller went away before dispatch, abandoning job");
            self.advance(&mut job, JobState::Abandoned);
            let cleanup = self.schedule_cleanup(&mut job, path);
            return self.finish(job, Err(AppError::Abandoned), Some(cleanup));
        }

        self.advance(&mut job, JobState::Dispatching);
        let result = self.dispatch(&job, path.clone()).await;
        match &result {
            Ok(report) => {
                info!(
                    job_id = %job.id,
                    invocations = report.invocations,
                    copies = report.copies,
                    "Print job dispatched"
                );
                self.advance(&mut job, JobState::Dispatched);
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Print dispatch failed");
                self.advance(&mut job, JobState::Failed);
            }
        }

        let cleanup = self.schedule_cleanup(&mut job, path);
        self.finish(job, result, Some(cleanup))
    }

    /// Render a single page for preview; the caller removes the file
    pub async fn render_preview(
        &self,
        record: &LabelRecord,
        tag: Option<LabelTag>,
    ) -> AppResult<PathBuf> {
        let renderer = Arc::clone(&self.renderer);
        let content = record.to_content(tag);
        let dir = self.spool_dir.clone();
        let path =
            tokio::task::spawn_blocking(move || renderer.render_to_spool(&content, 1, &dir))
                .await??;
        Ok(path)
    }

    async fn render(&self, job: &PrintJob) -> AppResult<PathBuf> {
        let renderer = Arc::clone(&self.renderer);
        let content = job.record.to_content(job.tag);
        let pages = job.pages();
        let dir = self.spool_dir.clone();

        let path =
            tokio::task::spawn_blocking(move || renderer.render_to_spool(&content, pages, &dir))
                .await??;
        Ok(path)
    }

    async fn dispatch(&self, job: &PrintJob, path: PathBuf) -> AppResult<DispatchReport> {
        let backend = Arc::clone(&self.backend);
        let copies = job.copies;
        let strategy = job.strategy;
        let printer = job.printer.clone();

        let report = tokio::task::spawn_blocking(move || {
            backend.dispatch(&path, copies, strategy, printer.as_deref())
        })
        .await??;
        Ok(report)
    }

    fn schedule_cleanup(&self, job: &mut PrintJob, path: PathBuf) -> CleanupHandle {
        self.advance(job, JobState::CleanupPending);
        self.cleanup.schedule(job.id, path)
    }

    fn advance(&self, job: &mut PrintJob, next: JobState) {
        match job.transition(next) {
            Ok(event) => {
                if let Some(tx) = &self.events {
                    let _ = tx.send(event);
                }
            }
            Err(e) => warn!(job_id = %job.id, error = %e, "Rejected job transition"),
        }
    }

    fn finish(
        &self,
        job: PrintJob,
        result: AppResult<DispatchReport>,
        cleanup: Option<CleanupHandle>,
    ) -> JobOutcome {
        let state = match &result {
            Ok(_) => JobState::Dispatched,
            Err(AppError::Abandoned) => JobState::Abandoned,
            Err(_) => JobState::Failed,
        };
        JobOutcome {
            job_id: job.id,
            state,
            result,
            cleanup,
        }
    }
}
