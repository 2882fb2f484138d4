//! Print worker
//!
//! Receives print requests over an mpsc channel and runs them through the
//! [`PrintPipeline`] one at a time. Each request carries a oneshot reply
//! channel; when the requester drops it before the label has been sent to
//! the printer, the job is abandoned.

use super::job::PrintRequest;
use super::service::{JobOutcome, PrintPipeline};
use crate::labels::LabelStore;
use crate::utils::{AppError, AppResult};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Queue depth before `submit` starts waiting
pub const PRINT_QUEUE_CAPACITY: usize = 32;

/// One queued request
#[derive(Debug)]
pub struct PrintCommand {
    pub request: PrintRequest,
    pub reply: oneshot::Sender<JobOutcome>,
}

/// Print worker
pub struct PrintWorker {
    pipeline: Arc<PrintPipeline>,
    store: LabelStore,
}

impl PrintWorker {
    pub fn new(pipeline: Arc<PrintPipeline>, store: LabelStore) -> Self {
        Self { pipeline, store }
    }

    /// Run the worker (until the channel closes or shutdown is requested)
    pub async fn run(self, mut rx: mpsc::Receiver<PrintCommand>, shutdown: CancellationToken) {
        tracing::info!("Print worker started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Print worker received shutdown signal");
                    break;
                }
                command = rx.recv() => {
                    let Some(command) = command else {
                        tracing::info!("Print channel closed, print worker stopping");
                        break;
                    };
                    self.handle(command).await;
                }
            }
        }
    }

    async fn handle(&self, command: PrintCommand) {
        let PrintCommand { request, reply } = command;

        if reply.is_closed() {
            tracing::debug!(code = %request.code, "Request dropped before start, skipping");
            return;
        }

        let record = match self.store.find(&request.code) {
            Ok(Some(record)) => record,
            Ok(None) => {
                let _ = reply.send(JobOutcome::rejected(AppError::not_found(&request.code)));
                return;
            }
            Err(e) => {
                tracing::error!(code = %request.code, error = %e, "Label lookup failed");
                let _ = reply.send(JobOutcome::rejected(e.into()));
                return;
            }
        };

        let outcome = self
            .pipeline
            .run_with(record, &request, || !reply.is_closed())
            .await;

        if let Err(outcome) = reply.send(outcome) {
            tracing::debug!(job_id = %outcome.job_id, "Requester gone, outcome dropped");
        }
    }
}

/// Sending side of the print worker
#[derive(Debug, Clone)]
pub struct PrintQueue {
    tx: mpsc::Sender<PrintCommand>,
}

impl PrintQueue {
    /// Spawn a [`PrintWorker`] and return the queue feeding it
    pub fn spawn(worker: PrintWorker, shutdown: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(PRINT_QUEUE_CAPACITY);
        let handle = tokio::spawn(worker.run(rx, shutdown));
        (Self { tx }, handle)
    }

    /// Queue a request; the receiver yields the outcome
    ///
    /// Dropping the receiver before the job is dispatched abandons it.
    pub async fn submit(&self, request: PrintRequest) -> AppResult<oneshot::Receiver<JobOutcome>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PrintCommand { request, reply })
            .await
            .map_err(|_| AppError::Task("print worker is not running".to_string()))?;
        Ok(rx)
    }

    /// Queue a request and wait for its outcome
    pub async fn print(&self, request: PrintRequest) -> AppResult<JobOutcome> {
        let rx = self.submit(request).await?;
        rx.await
            .map_err(|_| AppError::Task("print worker stopped".to_string()))
    }
}
