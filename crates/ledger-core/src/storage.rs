use crate::error::{LogError, LogResult};
use crate::record::HashedRecord;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Durable home of the transaction log.
///
/// Implementations hold the whole log as one unit:
/// - `load` returns `Ok(None)` when nothing has ever been stored, and `Err`
///   for anything present but unreadable. Absence and corruption are never
///   conflated.
/// - `store` replaces the previous content entirely. A failed `store` must
///   leave the previously stored content loadable.
pub trait LogStorage: Send {
    fn load(&self) -> LogResult<Option<Vec<HashedRecord>>>;

    fn store(&mut self, records: &[HashedRecord]) -> LogResult<()>;
}

/// Single JSON file, replaced atomically on every store
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> LogResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| LogError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_err(&self, source: io::Error) -> LogError {
        LogError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl LogStorage for FileStorage {
    fn load(&self) -> LogResult<Option<Vec<HashedRecord>>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No log at {}, starting empty", self.path.display());
                return Ok(None);
            }
            Err(source) => {
                return Err(LogError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if contents.trim().is_empty() {
            warn!("Log {} is empty, starting empty", self.path.display());
            return Ok(None);
        }

        let records = serde_json::from_str(&contents).map_err(|e| LogError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        Ok(Some(records))
    }

    fn store(&mut self, records: &[HashedRecord]) -> LogResult<()> {
        let data = serde_json::to_vec_pretty(records)?;
        let temp_path = self.temp_path();

        let mut file = File::create(&temp_path).map_err(|e| self.write_err(e))?;
        file.write_all(&data).map_err(|e| self.write_err(e))?;
        file.sync_all().map_err(|e| self.write_err(e))?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|e| self.write_err(e))?;

        // The new content is already in place, so a failed directory sync
        // is not reported as a failed store
        #[cfg(unix)]
        {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
                    warn!("Failed to sync directory {}: {e}", parent.display());
                }
            }
        }

        debug!("Persisted {} records to {}", records.len(), self.path.display());

        Ok(())
    }
}

/// In-memory storage whose clones share state.
///
/// Used by tests and embedders. With the `test-util` feature,
/// `fail_writes` makes every later `store` fail so the persistence-failure
/// path can be exercised.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    records: Arc<Mutex<Option<Vec<HashedRecord>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that already holds `records`, as if persisted by an earlier run
    pub fn with_records(records: Vec<HashedRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(Some(records))),
            fail_writes: Arc::default(),
        }
    }

    #[cfg(any(test, feature = "test-util"))]
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// What a fresh `load` would return
    pub fn stored(&self) -> Option<Vec<HashedRecord>> {
        self.records.lock().ok().and_then(|records| records.clone())
    }
}

impl LogStorage for MemoryStorage {
    fn load(&self) -> LogResult<Option<Vec<HashedRecord>>> {
        let records = self
            .records
            .lock()
            .map_err(|_| LogError::Unavailable("memory storage lock poisoned".into()))?;

        Ok(records.clone())
    }

    fn store(&mut self, records: &[HashedRecord]) -> LogResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LogError::Unavailable("writes disabled".into()));
        }

        let mut stored = self
            .records
            .lock()
            .map_err(|_| LogError::Unavailable("memory storage lock poisoned".into()))?;
        *stored = Some(records.to_vec());

        Ok(())
    }
}
