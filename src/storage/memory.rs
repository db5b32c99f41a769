use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::Storage;
use crate::sampler::CompletedTrial;

/// In-memory trial storage (the default).
pub struct MemoryStorage {
    trials: Arc<RwLock<Vec<CompletedTrial>>>,
    next_id: AtomicU64,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_trials(Vec::new())
    }

    /// Creates a store holding `trials`; new ids continue after the largest.
    #[must_use]
    pub fn with_trials(trials: Vec<CompletedTrial>) -> Self {
        let next_id = trials.iter().map(|t| t.id).max().map_or(0, |id| id + 1);
        Self {
            trials: Arc::new(RwLock::new(trials)),
            next_id: AtomicU64::new(next_id),
        }
    }

    /// Ensures the id counter is at least `min_value`.
    pub(crate) fn bump_next_id(&self, min_value: u64) {
        self.next_id.fetch_max(min_value, Ordering::SeqCst);
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn push(&self, trial: CompletedTrial) {
        self.trials.write().push(trial);
    }

    fn trials_arc(&self) -> &Arc<RwLock<Vec<CompletedTrial>>> {
        &self.trials
    }

    fn next_trial_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}
