//! Label code generation
//!
//! Codes look like `LBL-20240315093012345-0042`: prefix, local timestamp to
//! the millisecond, 4 random digits. Generating does not touch the store
//! beyond an existence probe; the insert is what actually guards uniqueness.

use super::storage::LabelStore;
use super::types::{LabelFields, LabelRecord};
use crate::utils::{AppError, AppResult};
use chrono::{Local, Utc};
use rand::Rng;
use tracing::{debug, warn};

pub const DEFAULT_CODE_PREFIX: &str = "LBL";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Existence check against the set of committed codes
pub trait CodeLookup {
    fn code_exists(&self, code: &str) -> AppResult<bool>;
}

impl CodeLookup for LabelStore {
    fn code_exists(&self, code: &str) -> AppResult<bool> {
        Ok(self.exists(code)?)
    }
}

/// Proposes candidate codes
pub trait CodeSource: Send + Sync {
    fn propose(&self) -> String;
}

/// `{PREFIX}-{YYYYMMDDhhmmssSSS}-{NNNN}`
#[derive(Debug, Clone)]
pub struct TimestampCodeSource {
    prefix: String,
}

impl TimestampCodeSource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl CodeSource for TimestampCodeSource {
    fn propose(&self) -> String {
        let stamp = Local::now().format("%Y%m%d%H%M%S%3f");
        let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
        format!("{}-{}-{:04}", self.prefix, stamp, suffix)
    }
}

/// Creates new label records with codes not present in the store
pub struct CodeGenerator {
    source: Box<dyn CodeSource>,
    max_attempts: u32,
}

impl CodeGenerator {
    pub fn new(prefix: impl Into<String>, max_attempts: u32) -> Self {
        Self::with_source(TimestampCodeSource::new(prefix), max_attempts)
    }

    pub fn with_source(source: impl CodeSource + 'static, max_attempts: u32) -> Self {
        Self {
            source: Box::new(source),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// New record for `fields` with a fresh code
    ///
    /// Nothing is persisted; the caller inserts the record.
    pub fn generate(&self, lookup: &impl CodeLookup, fields: LabelFields) -> AppResult<LabelRecord> {
        for attempt in 1..=self.max_attempts {
            let code = self.source.propose();
            if lookup.code_exists(&code)? {
                warn!(attempt, code = %code, "generated code collides, retrying");
                continue;
            }
            debug!(attempt, code = %code, "generated label code");
            return Ok(LabelRecord {
                code,
                created_at: Utc::now().timestamp_millis(),
                fields,
            });
        }
        Err(AppError::GenerationExhausted {
            attempts: self.max_attempts,
        })
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_PREFIX, DEFAULT_MAX_ATTEMPTS)
    }
}
