//! Label records: types, storage, code generation, import and search

pub mod generator;
pub mod import;
pub mod search;
pub mod storage;
pub mod types;

pub use generator::{CodeGenerator, CodeLookup, CodeSource, TimestampCodeSource};
pub use import::{BulkLine, ImportSummary, SkipReason, SkippedLine, import_bulk, parse_bulk_lines};
pub use storage::{LabelStorageError, LabelStorageResult, LabelStore, LabelStoreStats};
pub use types::{FIELD_DESCRIPTION, FIELD_NAME, LabelFields, LabelRecord, LabelTag};
