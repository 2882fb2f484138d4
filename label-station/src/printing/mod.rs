//! Label Printing Module
//!
//! Turns stored labels into print jobs:
//! - job: request, job state machine, state events
//! - service: render -> dispatch -> cleanup pipeline
//! - cleanup: delayed temp file removal
//! - worker: background queue feeding the pipeline

pub mod cleanup;
pub mod job;
pub mod service;
pub mod worker;

pub use cleanup::{CleanupHandle, CleanupScheduler, CleanupStatus};
pub use job::{JobEvent, JobState, MAX_COPIES, PrintJob, PrintRequest};
pub use service::{JobOutcome, PrintPipeline};
pub use worker::{PrintCommand, PrintQueue, PrintWorker};
