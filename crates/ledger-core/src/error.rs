use rust_decimal::Decimal;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures loading or persisting the transaction log
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to read log {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write log {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("log {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("record {index} fails its hash check (stored {stored}, computed {computed})")]
    HashMismatch {
        index: usize,
        stored: String,
        computed: String,
    },

    #[error("failed to serialize log: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Failures applying a command to the ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{cmd} of {amount} rejected with balance {balance}")]
    Rejected {
        cmd: &'static str,
        amount: Decimal,
        balance: Decimal,
    },

    #[error("balance overflow applying {cmd} of {amount}")]
    Overflow { cmd: &'static str, amount: Decimal },

    #[error("replayed balance overflows at record {index}")]
    ReplayOverflow { index: usize },

    #[error(transparent)]
    Log(#[from] LogError),
}

impl LedgerError {
    /// Validation failures leave state untouched and are reported to the client as rejections
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::Overflow { .. })
    }
}

pub type LogResult<T> = Result<T, LogError>;
pub type LedgerResult<T> = Result<T, LedgerError>;
