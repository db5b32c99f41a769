//! Sweep configuration.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hyperparams::HyperParams;
use crate::job::JobSettings;
use crate::model::EarlyStopping;
use crate::trial::Trial;

/// Seconds in one day, the default per-K timeout.
pub const SECONDS_IN_DAY: u64 = 86_400;

/// Which suggester drives the search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerKind {
    /// Tree-structured Parzen estimator.
    #[default]
    Tpe,
    /// Uniform random search.
    Random,
}

/// Bounds of the hyperparameter search.
///
/// The second hidden layer is never wider than the first: its upper bound is
/// the suggested first width.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpace {
    /// Log-uniform learning-rate range.
    pub learning_rate: (f64, f64),
    /// Batch-size range.
    pub batch_size: (i64, i64),
    /// First hidden-layer width range.
    pub n_hidden_1: (i64, i64),
    /// Lower bound of the second hidden-layer width.
    pub n_hidden_2_min: i64,
    /// Fixed latent-loss weight.
    pub alpha: f64,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            learning_rate: (1e-4, 1e-2),
            batch_size: (8, 128),
            n_hidden_1: (8, 128),
            n_hidden_2_min: 1,
            alpha: 1.0,
        }
    }
}

impl SearchSpace {
    /// Names of the suggested parameters, in suggestion order.
    pub const PARAM_NAMES: [&'static str; 4] =
        ["learning_rate", "batch_size", "n_hidden_1", "n_hidden_2"];

    /// Suggests one configuration for cluster count `k`.
    ///
    /// # Errors
    ///
    /// Propagates suggester errors.
    pub fn suggest(&self, trial: &mut Trial, k: usize) -> Result<HyperParams> {
        let learning_rate =
            trial.suggest_loguniform("learning_rate", self.learning_rate.0, self.learning_rate.1)?;
        let batch_size = trial.suggest_int("batch_size", self.batch_size.0, self.batch_size.1)?;
        let n_hidden_1 = trial.suggest_int("n_hidden_1", self.n_hidden_1.0, self.n_hidden_1.1)?;
        let n_hidden_2 = trial.suggest_int("n_hidden_2", self.n_hidden_2_min.min(n_hidden_1), n_hidden_1)?;
        Ok(HyperParams::new(
            k,
            vec![to_width(n_hidden_1)?, to_width(n_hidden_2)?],
            learning_rate,
            to_width(batch_size)?,
            self.alpha,
        ))
    }

    fn validate(&self) -> Result<()> {
        let (lr_low, lr_high) = self.learning_rate;
        if !(lr_low > 0.0 && lr_low <= lr_high) {
            return Err(invalid(format!("learning_rate range {lr_low}..{lr_high}")));
        }
        for (name, (low, high)) in [("batch_size", self.batch_size), ("n_hidden_1", self.n_hidden_1)] {
            if low < 1 || low > high {
                return Err(invalid(format!("{name} range {low}..{high}")));
            }
        }
        if self.n_hidden_2_min < 1 {
            return Err(invalid(format!("n_hidden_2_min {}", self.n_hidden_2_min)));
        }
        if !self.alpha.is_finite() {
            return Err(invalid(format!("alpha {}", self.alpha)));
        }
        Ok(())
    }
}

fn to_width(value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| invalid(format!("negative size {value}")))
}

fn invalid(message: String) -> Error {
    Error::InvalidConfig(message)
}

/// Everything a sweep needs besides the data and the model.
///
/// Deserializes from JSON with every field optional.
///
/// # Examples
///
/// ```
/// use vader_hpopt::sweep::OptimizerConfig;
///
/// let config = OptimizerConfig::default()
///     .with_k_list(vec![2, 3])
///     .with_n_trials(20)
///     .with_seed(Some(7));
/// config.validate().unwrap();
/// assert_eq!(
///     config.run_id(),
///     "n_trials20_n_repeats10_n_splits2_n_consensus1_n_epoch10_n_perm100_seed7"
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Jobs per trial, each with its own seed.
    pub n_repeats: usize,
    /// Concurrency ceiling for candidate K values and for trials within one.
    pub n_proc: usize,
    /// Trial budget per candidate K.
    pub n_trials: usize,
    /// Consensus repeats per fold.
    pub n_consensus: usize,
    /// Training epochs.
    pub n_epoch: usize,
    /// Pre-training epochs.
    pub n_pre_epoch: usize,
    /// Cross-validation folds.
    pub n_splits: usize,
    /// Permutations for the null baseline.
    pub n_perm: usize,
    /// Base seed; `None` runs nondeterministically.
    pub seed: Option<u64>,
    /// Root of every output file.
    pub output_folder: PathBuf,
    /// Candidate cluster counts.
    pub k_list: Vec<usize>,
    /// Per-K wall-clock budget in seconds.
    pub timeout_secs: u64,
    /// Continue the journaled studies of an earlier run.
    pub resume: bool,
    /// Suggester.
    pub sampler: SamplerKind,
    /// Hyperparameter bounds.
    pub search_space: SearchSpace,
    /// Early stopping for every fit.
    pub early_stopping: Option<EarlyStopping>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            n_repeats: 10,
            n_proc: 1,
            n_trials: 100,
            n_consensus: 1,
            n_epoch: 10,
            n_pre_epoch: 10,
            n_splits: 2,
            n_perm: 100,
            seed: None,
            output_folder: PathBuf::from("."),
            k_list: vec![2, 3, 4, 5, 6],
            timeout_secs: SECONDS_IN_DAY,
            resume: false,
            sampler: SamplerKind::Tpe,
            search_space: SearchSpace::default(),
            early_stopping: None,
        }
    }
}

impl OptimizerConfig {
    /// Loads a JSON config file; absent fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::InvalidConfig`] if it is not valid JSON for this type.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))
    }

    /// Rejects configurations that cannot run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending value.
    pub fn validate(&self) -> Result<()> {
        if self.n_repeats == 0 {
            return Err(invalid("n_repeats must be at least 1".into()));
        }
        if self.n_proc == 0 {
            return Err(invalid("n_proc must be at least 1".into()));
        }
        if self.n_splits < 2 {
            return Err(invalid(format!("n_splits must be at least 2, got {}", self.n_splits)));
        }
        if self.n_perm == 0 {
            return Err(invalid("n_perm must be at least 1".into()));
        }
        if self.n_epoch == 0 {
            return Err(invalid("n_epoch must be at least 1".into()));
        }
        if self.k_list.is_empty() {
            return Err(invalid("k_list is empty".into()));
        }
        if let Some(k) = self.k_list.iter().find(|&&k| k < 1) {
            return Err(invalid(format!("cluster count {k} in k_list")));
        }
        // Each K owns its trial files and journal.
        let mut seen = BTreeSet::new();
        if let Some(k) = self.k_list.iter().find(|&&k| !seen.insert(k)) {
            return Err(invalid(format!("cluster count {k} listed twice in k_list")));
        }
        self.search_space.validate()
    }

    /// Identifier embedded in the sweep-level output file names.
    #[must_use]
    pub fn run_id(&self) -> String {
        let seed = self.seed.map_or_else(|| "None".to_string(), |s| s.to_string());
        format!(
            "n_trials{}_n_repeats{}_n_splits{}_n_consensus{}_n_epoch{}_n_perm{}_seed{seed}",
            self.n_trials, self.n_repeats, self.n_splits, self.n_consensus, self.n_epoch, self.n_perm
        )
    }

    /// Settings handed to every job.
    #[must_use]
    pub fn job_settings(&self) -> JobSettings {
        JobSettings::default()
            .with_n_consensus(self.n_consensus)
            .with_n_epoch(self.n_epoch)
            .with_n_pre_epoch(self.n_pre_epoch)
            .with_n_splits(self.n_splits)
            .with_n_perm(self.n_perm)
            .with_early_stopping(self.early_stopping)
    }

    /// Per-K wall-clock budget.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Directory of per-trial CSV files.
    #[must_use]
    pub fn trials_dir(&self) -> PathBuf {
        self.output_folder.join("trials")
    }

    /// Directory of repeat-grouped CSV files.
    #[must_use]
    pub fn repeats_dir(&self) -> PathBuf {
        self.output_folder.join("repeats")
    }

    /// Directory of failure logs.
    #[must_use]
    pub fn failed_jobs_dir(&self) -> PathBuf {
        self.output_folder.join("failed_jobs")
    }

    /// Directory of study journals.
    #[must_use]
    pub fn studies_dir(&self) -> PathBuf {
        self.output_folder.join("studies")
    }

    /// Per-trial CSV of trial `number` for cluster count `k`.
    #[must_use]
    pub fn trial_path(&self, k: usize, number: u64) -> PathBuf {
        self.trials_dir().join(format!("k{k}_trial{number}.csv"))
    }

    /// Journal of the study for cluster count `k`.
    #[must_use]
    pub fn study_path(&self, k: usize) -> PathBuf {
        self.studies_dir().join(format!("VaDER_k{k}.jsonl"))
    }

    /// Best-scores table.
    #[must_use]
    pub fn best_scores_path(&self) -> PathBuf {
        self.output_folder.join(format!("best_scores_{}.csv", self.run_id()))
    }

    /// All-trials table.
    #[must_use]
    pub fn all_trials_path(&self) -> PathBuf {
        self.output_folder.join(format!("trials_{}.csv", self.run_id()))
    }

    /// Sets the repeats per trial.
    #[must_use]
    pub fn with_n_repeats(mut self, n: usize) -> Self {
        self.n_repeats = n;
        self
    }

    /// Sets the concurrency ceiling.
    #[must_use]
    pub fn with_n_proc(mut self, n: usize) -> Self {
        self.n_proc = n;
        self
    }

    /// Sets the trial budget per K.
    #[must_use]
    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    /// Sets the consensus repeats per fold.
    #[must_use]
    pub fn with_n_consensus(mut self, n: usize) -> Self {
        self.n_consensus = n;
        self
    }

    /// Sets the training epochs.
    #[must_use]
    pub fn with_n_epoch(mut self, n: usize) -> Self {
        self.n_epoch = n;
        self
    }

    /// Sets the pre-training epochs.
    #[must_use]
    pub fn with_n_pre_epoch(mut self, n: usize) -> Self {
        self.n_pre_epoch = n;
        self
    }

    /// Sets the fold count.
    #[must_use]
    pub fn with_n_splits(mut self, n: usize) -> Self {
        self.n_splits = n;
        self
    }

    /// Sets the permutation count.
    #[must_use]
    pub fn with_n_perm(mut self, n: usize) -> Self {
        self.n_perm = n;
        self
    }

    /// Sets the base seed.
    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the output root.
    #[must_use]
    pub fn with_output_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.output_folder = folder.into();
        self
    }

    /// Sets the candidate cluster counts.
    #[must_use]
    pub fn with_k_list(mut self, k_list: Vec<usize>) -> Self {
        self.k_list = k_list;
        self
    }

    /// Sets the per-K timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    /// Enables or disables study resume.
    #[must_use]
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Sets the suggester.
    #[must_use]
    pub fn with_sampler(mut self, sampler: SamplerKind) -> Self {
        self.sampler = sampler;
        self
    }

    /// Sets the search bounds.
    #[must_use]
    pub fn with_search_space(mut self, space: SearchSpace) -> Self {
        self.search_space = space;
        self
    }

    /// Sets the early-stopping rule.
    #[must_use]
    pub fn with_early_stopping(mut self, rule: Option<EarlyStopping>) -> Self {
        self.early_stopping = rule;
        self
    }
}
