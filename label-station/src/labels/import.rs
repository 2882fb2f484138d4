//! Bulk paste import
//!
//! One label per line: the first word is the material name, the rest of the
//! line is the description.
//!
//! ```text
//! VG0100 Virgin resin, natural
//! PP10   Polypropylene regrind
//! ```

use super::generator::CodeGenerator;
use super::storage::LabelStore;
use super::types::{FIELD_DESCRIPTION, FIELD_NAME, LabelFields, LabelRecord};
use crate::utils::{AppError, AppResult};
use tracing::{info, warn};

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkLine {
    /// 1-based line number in the pasted text
    pub line_no: usize,
    pub name: String,
    pub description: String,
}

impl BulkLine {
    pub fn fields(&self) -> LabelFields {
        let mut fields = LabelFields::new();
        fields.set(FIELD_NAME, self.name.clone());
        fields.set(FIELD_DESCRIPTION, self.description.clone());
        fields
    }
}

/// Split pasted text into name/description lines, skipping blank lines
pub fn parse_bulk_lines(text: &str) -> Vec<BulkLine> {
    text.lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let line = raw.trim();
            if line.is_empty() {
                return None;
            }
            let (name, description) = match line.split_once(char::is_whitespace) {
                Some((name, rest)) => (name, rest.trim()),
                None => (line, ""),
            };
            Some(BulkLine {
                line_no: idx + 1,
                name: name.to_string(),
                description: description.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A label with the same material name already exists
    NameExists,
    /// The generated code was taken between generation and insert
    DuplicateCode(String),
    /// No free code could be generated
    GenerationExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line_no: usize,
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub added: Vec<LabelRecord>,
    pub skipped: Vec<SkippedLine>,
}

/// Create one label per line
///
/// Bad lines are skipped and reported; only storage failures abort the batch.
pub fn import_bulk(
    generator: &CodeGenerator,
    store: &LabelStore,
    text: &str,
) -> AppResult<ImportSummary> {
    let mut summary = ImportSummary::default();

    for line in parse_bulk_lines(text) {
        let skip = |reason| SkippedLine {
            line_no: line.line_no,
            name: line.name.clone(),
            reason,
        };

        if store.find_by_name(&line.name)?.is_some() {
            warn!(line = line.line_no, name = %line.name, "name exists, skipping");
            summary.skipped.push(skip(SkipReason::NameExists));
            continue;
        }

        let record = match generator.generate(store, line.fields()) {
            Ok(record) => record,
            Err(AppError::GenerationExhausted { .. }) => {
                summary.skipped.push(skip(SkipReason::GenerationExhausted));
                continue;
            }
            Err(e) => return Err(e),
        };

        match store.insert(&record).map_err(AppError::from) {
            Ok(()) => summary.added.push(record),
            Err(AppError::DuplicateCode(code)) => {
                warn!(line = line.line_no, code = %code, "code taken, skipping");
                summary.skipped.push(skip(SkipReason::DuplicateCode(code)));
            }
            Err(AppError::DuplicateName(_)) => {
                warn!(line = line.line_no, name = %line.name, "name taken, skipping");
                summary.skipped.push(skip(SkipReason::NameExists));
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        added = summary.added.len(),
        skipped = summary.skipped.len(),
        "bulk import finished"
    );
    Ok(summary)
}
