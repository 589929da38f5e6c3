use crate::command::Command;
use crate::error::{LogError, LogResult};
use crate::record::HashedRecord;
use crate::storage::LogStorage;
use tracing::{error, info, warn};

/// Ordered, durable sequence of hashed records.
///
/// Insertion order is replay order. Records are never rewritten once
/// appended; the only removal is undoing an append whose persist failed.
#[derive(Debug)]
pub struct TransactionLog<S> {
    storage: S,
    records: Vec<HashedRecord>,
}

impl<S: LogStorage> TransactionLog<S> {
    /// Load the log from `storage`, verifying every record's hash.
    ///
    /// Nothing stored yields an empty log. Anything stored but unreadable is
    /// an error unless `reset` is set, in which case stored content is
    /// ignored and replaced on the next persist.
    pub fn open(storage: S, reset: bool) -> LogResult<Self> {
        if reset {
            warn!("Reset requested, ignoring stored log");
            return Ok(Self::empty(storage));
        }

        let records = storage.load()?.unwrap_or_default();

        for (index, record) in records.iter().enumerate() {
            let computed = record.computed_hash();
            if computed != record.hash {
                return Err(LogError::HashMismatch {
                    index,
                    stored: record.hash.clone(),
                    computed,
                });
            }
        }

        info!("Loaded {} log records", records.len());

        Ok(Self { storage, records })
    }

    pub const fn empty(storage: S) -> Self {
        Self {
            storage,
            records: Vec::new(),
        }
    }

    /// Hash `value` and push it in memory only
    pub fn append(&mut self, value: Command) -> &HashedRecord {
        self.records.push(HashedRecord::new(value));
        let index = self.records.len() - 1;

        &self.records[index]
    }

    /// Write the full in-memory sequence to storage
    pub fn persist(&mut self) -> LogResult<()> {
        self.storage.store(&self.records)
    }

    /// Append and persist as one step.
    ///
    /// On a failed persist the record is dropped again, so memory never
    /// holds a record storage does not.
    pub fn commit(&mut self, value: Command) -> LogResult<&HashedRecord> {
        self.records.push(HashedRecord::new(value));

        if let Err(e) = self.storage.store(&self.records) {
            error!("Failed to persist log: {e}");
            self.records.pop();

            return Err(e);
        }

        let index = self.records.len() - 1;

        Ok(&self.records[index])
    }

    /// Read-only snapshot for replay
    pub fn dump(&self) -> &[HashedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
