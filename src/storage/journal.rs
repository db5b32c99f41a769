//! JSONL-based journal storage backend.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::{Mutex, RwLock};

use super::{MemoryStorage, Storage};
use crate::error::{Error, Result};
use crate::sampler::CompletedTrial;

/// Appends finished trials as JSON lines to a file.
///
/// Trials are kept in memory for reads and persisted on every push. Writes
/// take an exclusive file lock and reads a shared one, so several processes
/// may share a journal. Opening an existing journal resumes its history and
/// its trial numbering.
///
/// # Examples
///
/// ```no_run
/// use vader_hpopt::storage::JournalStorage;
///
/// let storage = JournalStorage::open("studies/VaDER_k3.jsonl").unwrap();
/// ```
pub struct JournalStorage {
    memory: MemoryStorage,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JournalStorage {
    /// Creates a journal at `path` without loading existing content.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            memory: MemoryStorage::new(),
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Opens a journal and loads every stored trial. A missing file is an
    /// empty journal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file exists but cannot be read or
    /// parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let trials = load_trials_from_file(&path)?;
        Ok(Self {
            memory: MemoryStorage::with_trials(trials),
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_to_file(&self, trial: &CompletedTrial) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::Storage(e.to_string()))?;
        file.lock_exclusive()
            .map_err(|e| Error::Storage(e.to_string()))?;

        let line = serde_json::to_string(trial).map_err(|e| Error::Storage(e.to_string()))?;
        let written = writeln!(file, "{line}").and_then(|()| file.flush());
        file.unlock().map_err(|e| Error::Storage(e.to_string()))?;
        written.map_err(|e| Error::Storage(e.to_string()))
    }
}

impl Storage for JournalStorage {
    fn push(&self, trial: CompletedTrial) {
        // The trial stays in memory even if the write fails.
        if let Err(_err) = self.write_to_file(&trial) {
            trace_warn!(path = %self.path.display(), error = %_err, "failed to journal trial");
        }
        self.memory.push(trial);
    }

    fn trials_arc(&self) -> &Arc<RwLock<Vec<CompletedTrial>>> {
        self.memory.trials_arc()
    }

    fn next_trial_id(&self) -> u64 {
        self.memory.next_trial_id()
    }

    fn refresh(&self) -> bool {
        let Ok(loaded) = load_trials_from_file(&self.path) else {
            return false;
        };
        let mut guard = self.memory.trials_arc().write();
        if loaded.len() > guard.len() {
            if let Some(max_id) = loaded.iter().map(|t| t.id).max() {
                self.memory.bump_next_id(max_id + 1);
            }
            *guard = loaded;
            true
        } else {
            false
        }
    }
}

fn load_trials_from_file(path: &Path) -> Result<Vec<CompletedTrial>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::Storage(e.to_string())),
    };
    file.lock_shared()
        .map_err(|e| Error::Storage(e.to_string()))?;

    let mut trials = Vec::new();
    let mut parsed = Ok(());
    for line in BufReader::new(&file).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                parsed = Err(Error::Storage(e.to_string()));
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(trial) => trials.push(trial),
            Err(e) => {
                parsed = Err(Error::Storage(e.to_string()));
                break;
            }
        }
    }

    file.unlock().map_err(|e| Error::Storage(e.to_string()))?;
    parsed.map(|()| trials)
}
