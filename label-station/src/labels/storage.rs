//! redb-based label store
//!
//! Records are stored as JSON keyed by code. A second table keeps insertion
//! order (sequence number -> code) so listings and search results come back
//! in the order labels were created. A third maps the normalised material
//! name to its code; material names are unique.

use super::search;
use super::types::{LabelFields, LabelRecord};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

/// Labels table: key = code, value = JSON
const LABELS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("labels");

/// Insertion order: sequence -> code
const LABEL_ORDER_TABLE: TableDefinition<u64, &str> = TableDefinition::new("label_order");

/// Name index: normalised material name -> code
const LABEL_NAMES_TABLE: TableDefinition<&str, &str> = TableDefinition::new("label_names");

/// Counters
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("label_meta");

const NEXT_SEQ_KEY: &str = "next_seq";

#[derive(Debug, Error)]
pub enum LabelStorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Label code already exists: {0}")]
    DuplicateCode(String),

    #[error("Label not found: {0}")]
    NotFound(String),

    #[error("Material name already exists: {0}")]
    DuplicateName(String),

    #[error("Label has no material name: {0}")]
    MissingName(String),
}

pub type LabelStorageResult<T> = Result<T, LabelStorageError>;

#[derive(Serialize, Deserialize)]
struct StoredLabel {
    seq: u64,
    record: LabelRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelStoreStats {
    pub count: u64,
}

/// Persistent label table
#[derive(Clone)]
pub struct LabelStore {
    db: Arc<Database>,
}

impl LabelStore {
    /// Open or create the database, creating the parent directory if needed
    pub fn open(path: impl AsRef<Path>) -> LabelStorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> LabelStorageResult<Self> {
        let db =
            Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> LabelStorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(LABELS_TABLE)?;
            let _ = write_txn.open_table(LABEL_ORDER_TABLE)?;
            let _ = write_txn.open_table(LABEL_NAMES_TABLE)?;
            let _ = write_txn.open_table(META_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Insert a new record
    ///
    /// The code and name checks run inside the write transaction, so two
    /// concurrent inserts of the same code (or name) cannot both succeed.
    #[instrument(skip(self, record), fields(code = %record.code))]
    pub fn insert(&self, record: &LabelRecord) -> LabelStorageResult<()> {
        let name_key = name_key(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut labels = write_txn.open_table(LABELS_TABLE)?;
            if labels.get(record.code.as_str())?.is_some() {
                return Err(LabelStorageError::DuplicateCode(record.code.clone()));
            }

            let mut names = write_txn.open_table(LABEL_NAMES_TABLE)?;
            if names.get(name_key.as_str())?.is_some() {
                return Err(LabelStorageError::DuplicateName(
                    record.name().unwrap_or_default().trim().to_string(),
                ));
            }
            names.insert(name_key.as_str(), record.code.as_str())?;

            let mut meta = write_txn.open_table(META_TABLE)?;
            let seq = meta.get(NEXT_SEQ_KEY)?.map(|g| g.value()).unwrap_or(0);
            meta.insert(NEXT_SEQ_KEY, seq + 1)?;

            let value = serde_json::to_vec(&StoredLabel {
                seq,
                record: record.clone(),
            })?;
            labels.insert(record.code.as_str(), value.as_slice())?;

            let mut order = write_txn.open_table(LABEL_ORDER_TABLE)?;
            order.insert(seq, record.code.as_str())?;
        }
        write_txn.commit()?;

        debug!("label stored");
        Ok(())
    }

    pub fn exists(&self, code: &str) -> LabelStorageResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LABELS_TABLE)?;
        Ok(table.get(code)?.is_some())
    }

    pub fn find(&self, code: &str) -> LabelStorageResult<Option<LabelRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LABELS_TABLE)?;

        match table.get(code)? {
            Some(guard) => {
                let stored: StoredLabel = serde_json::from_slice(guard.value())?;
                Ok(Some(stored.record))
            }
            None => Ok(None),
        }
    }

    /// Record whose normalised name equals `name`'s
    pub fn find_by_name(&self, name: &str) -> LabelStorageResult<Option<LabelRecord>> {
        let wanted = search::normalize_name(name);
        let read_txn = self.db.begin_read()?;
        let names = read_txn.open_table(LABEL_NAMES_TABLE)?;
        let Some(code) = names.get(wanted.as_str())?.map(|g| g.value().to_string()) else {
            return Ok(None);
        };

        let labels = read_txn.open_table(LABELS_TABLE)?;
        match labels.get(code.as_str())? {
            Some(guard) => {
                let stored: StoredLabel = serde_json::from_slice(guard.value())?;
                Ok(Some(stored.record))
            }
            None => Ok(None),
        }
    }

    /// All records in insertion order
    pub fn list(&self) -> LabelStorageResult<Vec<LabelRecord>> {
        let read_txn = self.db.begin_read()?;
        let order = read_txn.open_table(LABEL_ORDER_TABLE)?;
        let labels = read_txn.open_table(LABELS_TABLE)?;

        let mut records = Vec::new();
        for entry in order.iter()? {
            let (_, code) = entry?;
            if let Some(guard) = labels.get(code.value())? {
                let stored: StoredLabel = serde_json::from_slice(guard.value())?;
                records.push(stored.record);
            }
        }
        Ok(records)
    }

    /// Records matching `query`, in insertion order
    pub fn search(&self, query: &str) -> LabelStorageResult<Vec<LabelRecord>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|r| search::matches(r, query))
            .collect())
    }

    /// Apply `fields` on top of the stored fields; the code never changes
    ///
    /// A renamed label must keep a non-empty name no other label has.
    #[instrument(skip(self, fields))]
    pub fn update(&self, code: &str, fields: LabelFields) -> LabelStorageResult<LabelRecord> {
        let write_txn = self.db.begin_write()?;
        let record = {
            let mut labels = write_txn.open_table(LABELS_TABLE)?;
            let existing = labels.get(code)?.map(|g| g.value().to_vec());
            let Some(bytes) = existing else {
                return Err(LabelStorageError::NotFound(code.to_string()));
            };

            let mut stored: StoredLabel = serde_json::from_slice(&bytes)?;
            let old_key = stored.record.name().map(search::normalize_name);
            stored.record.fields.merge(fields);
            let new_key = name_key(&stored.record)?;

            if old_key.as_deref() != Some(new_key.as_str()) {
                let mut names = write_txn.open_table(LABEL_NAMES_TABLE)?;
                let owner = names.get(new_key.as_str())?.map(|g| g.value().to_string());
                if owner.is_some_and(|owner| owner != code) {
                    return Err(LabelStorageError::DuplicateName(
                        stored.record.name().unwrap_or_default().trim().to_string(),
                    ));
                }
                if let Some(old_key) = &old_key {
                    names.remove(old_key.as_str())?;
                }
                names.insert(new_key.as_str(), code)?;
            }

            let value = serde_json::to_vec(&stored)?;
            labels.insert(code, value.as_slice())?;
            stored.record
        };
        write_txn.commit()?;

        debug!("label updated");
        Ok(record)
    }

    #[instrument(skip(self))]
    pub fn delete(&self, code: &str) -> LabelStorageResult<LabelRecord> {
        let write_txn = self.db.begin_write()?;
        let record = {
            let mut labels = write_txn.open_table(LABELS_TABLE)?;
            let removed = labels.remove(code)?.map(|g| g.value().to_vec());
            let Some(bytes) = removed else {
                return Err(LabelStorageError::NotFound(code.to_string()));
            };

            let stored: StoredLabel = serde_json::from_slice(&bytes)?;
            let mut order = write_txn.open_table(LABEL_ORDER_TABLE)?;
            order.remove(stored.seq)?;

            if let Some(name) = stored.record.name() {
                let mut names = write_txn.open_table(LABEL_NAMES_TABLE)?;
                let key = search::normalize_name(name);
                let owner = names.get(key.as_str())?.map(|g| g.value().to_string());
                if owner.as_deref() == Some(code) {
                    names.remove(key.as_str())?;
                }
            }
            stored.record
        };
        write_txn.commit()?;

        debug!("label deleted");
        Ok(record)
    }

    pub fn stats(&self) -> LabelStorageResult<LabelStoreStats> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LABELS_TABLE)?;
        Ok(LabelStoreStats {
            count: table.len()?,
        })
    }
}

/// Normalised name index key; every stored label needs a name
fn name_key(record: &LabelRecord) -> LabelStorageResult<String> {
    match record.name().map(str::trim) {
        Some(name) if !name.is_empty() => Ok(search::normalize_name(name)),
        _ => Err(LabelStorageError::MissingName(record.code.clone())),
    }
}
