pub mod command;
pub mod engine;
pub mod error;
pub mod log;
pub mod processor;
pub mod record;
pub mod signing;
pub mod storage;

use crate::engine::LedgerEngine;
use crate::error::LedgerResult;
use crate::log::TransactionLog;
use crate::storage::FileStorage;
use std::path::Path;

/// Open the file-backed ledger at `path`, replaying its log into a fresh engine
pub fn open_ledger(
    path: impl AsRef<Path>,
    reset: bool,
) -> LedgerResult<LedgerEngine<FileStorage>> {
    let storage = FileStorage::new(path)?;
    let log = TransactionLog::open(storage, reset)?;

    LedgerEngine::new(log)
}
