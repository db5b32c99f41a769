//! Study implementation for managing optimization trials.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::sampler::random::RandomSampler;
use crate::sampler::{CompletedTrial, Sampler};
use crate::storage::{MemoryStorage, Storage};
use crate::types::{Direction, TrialState};

mod async_impl;
mod export;
mod optimize;

pub use crate::trial::Trial;
pub(crate) use export::union_header;

/// A study drives the optimization, tracking trials and their results.
///
/// Parameters are suggested through the study's [`Sampler`], which sees
/// every finished trial. Finished trials go to a [`Storage`] backend,
/// in memory by default or a [`JournalStorage`](crate::storage::JournalStorage)
/// to make the study resumable.
///
/// # Examples
///
/// ```
/// use vader_hpopt::{Direction, Study};
///
/// let study = Study::new(Direction::Maximize);
/// assert_eq!(study.direction(), Direction::Maximize);
/// assert_eq!(study.n_trials(), 0);
/// ```
pub struct Study {
    direction: Direction,
    sampler: Arc<dyn Sampler>,
    storage: Arc<dyn Storage>,
}

impl Study {
    /// Creates a study with a [`RandomSampler`] and in-memory storage.
    #[must_use]
    pub fn new(direction: Direction) -> Self {
        Self::with_sampler(direction, RandomSampler::new())
    }

    /// Creates a study with a custom sampler.
    ///
    /// # Examples
    ///
    /// ```
    /// use vader_hpopt::sampler::tpe::TpeSampler;
    /// use vader_hpopt::{Direction, Study};
    ///
    /// let sampler = TpeSampler::builder().seed(42).build().unwrap();
    /// let study = Study::with_sampler(Direction::Maximize, sampler);
    /// ```
    pub fn with_sampler(direction: Direction, sampler: impl Sampler + 'static) -> Self {
        Self::with_sampler_and_storage(direction, sampler, MemoryStorage::new())
    }

    /// Creates a study with a custom sampler and storage backend.
    pub fn with_sampler_and_storage(
        direction: Direction,
        sampler: impl Sampler + 'static,
        storage: impl Storage + 'static,
    ) -> Self {
        Self::from_parts(direction, Arc::new(sampler), Arc::new(storage))
    }

    pub(crate) fn from_parts(
        direction: Direction,
        sampler: Arc<dyn Sampler>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            direction,
            sampler,
            storage,
        }
    }

    /// The optimization direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Creates a new trial wired to the study's sampler and history.
    ///
    /// Storage is refreshed first so that trials written by other processes
    /// sharing a journal inform the suggestions.
    #[must_use]
    pub fn create_trial(&self) -> Trial {
        self.storage.refresh();
        let id = self.storage.next_trial_id();
        Trial::with_sampler(
            id,
            self.direction,
            Arc::clone(&self.sampler),
            Arc::clone(self.storage.trials_arc()),
        )
    }

    /// Alias of [`create_trial`](Self::create_trial) for ask/tell loops.
    #[must_use]
    pub fn ask(&self) -> Trial {
        self.create_trial()
    }

    /// Records the outcome of a trial obtained from [`ask`](Self::ask).
    pub fn tell<E: ToString>(&self, trial: Trial, value: core::result::Result<Option<f64>, E>) {
        match value {
            Ok(v) => self.complete_trial(trial, v),
            Err(e) => self.fail_trial(trial, e),
        }
    }

    /// Records a complete trial. `None` marks an undefined objective value.
    pub fn complete_trial(&self, trial: Trial, value: Option<f64>) {
        self.storage
            .push(trial.into_completed(value, TrialState::Complete));
    }

    /// Records a failed trial. Failed trials never inform the sampler.
    pub fn fail_trial(&self, trial: Trial, error: impl ToString) {
        let _reason = error.to_string();
        trace_debug!(trial_id = trial.id(), reason = %_reason, "trial failed");
        self.storage.push(trial.into_completed(None, TrialState::Failed));
    }

    /// Every recorded trial, complete and failed, in recording order.
    #[must_use]
    pub fn trials(&self) -> Vec<CompletedTrial> {
        self.storage.trials_arc().read().clone()
    }

    /// Number of complete trials.
    #[must_use]
    pub fn n_trials(&self) -> usize {
        self.storage
            .trials_arc()
            .read()
            .iter()
            .filter(|t| t.state == TrialState::Complete)
            .count()
    }

    /// Number of failed trials.
    #[must_use]
    pub fn n_failed_trials(&self) -> usize {
        self.storage
            .trials_arc()
            .read()
            .iter()
            .filter(|t| t.state == TrialState::Failed)
            .count()
    }

    /// The best complete trial. Trials without a value rank last but can
    /// still be returned when nothing better exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCompletedTrials`] if no trial is complete.
    pub fn best_trial(&self) -> Result<CompletedTrial> {
        let trials = self.storage.trials_arc().read();
        trials
            .iter()
            .filter(|t| t.state == TrialState::Complete)
            .min_by(|a, b| {
                a.rank_key(self.direction)
                    .total_cmp(&b.rank_key(self.direction))
                    .then(a.id.cmp(&b.id))
            })
            .cloned()
            .ok_or(Error::NoCompletedTrials)
    }

    /// The best objective value, `None` if the best trial has no value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCompletedTrials`] if no trial is complete.
    pub fn best_value(&self) -> Result<Option<f64>> {
        self.best_trial().map(|t| t.value)
    }

    pub(crate) fn has_complete_trial(&self) -> bool {
        self.storage
            .trials_arc()
            .read()
            .iter()
            .any(|t| t.state == TrialState::Complete)
    }
}

impl core::fmt::Debug for Study {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Study")
            .field("direction", &self.direction)
            .field("n_trials", &self.n_trials())
            .finish_non_exhaustive()
    }
}
