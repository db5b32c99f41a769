//! Cross-validated evaluation of one hyperparameter configuration.
//!
//! An [`OptimizationJob`] splits the data into folds, runs a [`FoldStep`] on
//! every fold, scores each fold's labels against a reference clustering of
//! the validation data (and against its permutation null), and reduces the
//! per-fold scalars to one row.
//!
//! The fold step is pluggable: [`FoldRunner`] fits one model per fold and
//! [`ConsensusStep`] wraps any step to repeat it and fuse the labels.

mod consensus;
mod fold;
pub mod result;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use consensus::ConsensusStep;
pub use fold::FoldRunner;
pub use result::{FoldOutcome, FoldResult, METRIC_COLUMNS, SCORE_COLUMN};

use crate::clustering::{ClusteringMetrics, permuted_clustering_evaluation_metrics};
use crate::cv::KFold;
use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::hyperparams::HyperParams;
use crate::model::{EarlyStopping, Model, ModelFactory};
use crate::seed::{PERMUTATION_SALT, REFERENCE_SALT, SPLIT_SALT, derive_optional_seed, rng_from};
use crate::table::Row;
use crate::types::JobState;

/// Knobs shared by every job of a sweep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Consensus repeats per fold; `<= 1` disables consensus.
    pub n_consensus: usize,
    /// Training epochs.
    pub n_epoch: usize,
    /// Pre-training epochs.
    pub n_pre_epoch: usize,
    /// Number of cross-validation folds.
    pub n_splits: usize,
    /// Permutations for the null baseline.
    pub n_perm: usize,
    /// Recurrent encoder/decoder flag passed to the model.
    pub recurrent: bool,
    /// Optional early-stopping rule.
    pub early_stopping: Option<EarlyStopping>,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            n_consensus: 1,
            n_epoch: 10,
            n_pre_epoch: 10,
            n_splits: 2,
            n_perm: 100,
            recurrent: true,
            early_stopping: None,
        }
    }
}

impl JobSettings {
    /// Sets the consensus repeat count.
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

    /// Sets the early-stopping rule.
    #[must_use]
    pub fn with_early_stopping(mut self, rule: Option<EarlyStopping>) -> Self {
        self.early_stopping = rule;
        self
    }

    /// Rejects settings no job can run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `n_epoch` or `n_perm` is zero or
    /// `n_splits < 2`.
    pub fn validate(&self) -> Result<()> {
        if self.n_epoch == 0 {
            return Err(Error::InvalidConfig("n_epoch must be at least 1".into()));
        }
        if self.n_splits < 2 {
            return Err(Error::InvalidConfig(format!(
                "n_splits must be at least 2, got {}",
                self.n_splits
            )));
        }
        if self.n_perm == 0 {
            return Err(Error::InvalidConfig("n_perm must be at least 1".into()));
        }
        Ok(())
    }
}

/// One way of turning a fold into an outcome.
pub trait FoldStep {
    /// The model type this step trains.
    type Model: Model;

    /// Fits a model on `data`.
    ///
    /// # Errors
    ///
    /// Propagates model construction and training errors.
    fn fit_model(&self, data: &Dataset, seed: Option<u64>) -> Result<Self::Model>;

    /// Fits on `train` and predicts `val`.
    ///
    /// # Errors
    ///
    /// Propagates model and clustering errors.
    fn run_fold(&self, train: &Dataset, val: &Dataset, seed: Option<u64>) -> Result<FoldOutcome>;
}

/// Runs `step` over a seeded K-fold split of `data`.
///
/// Fold `f` runs with `derive(seed, [f])`. Its validation data is also
/// clustered by a fresh reference fit (`derive(seed, [f, REFERENCE])`), and
/// the fold labels are scored against that reference and against
/// `n_perm` permutations of themselves (`derive(seed, [f, PERMUTATION])`).
///
/// # Errors
///
/// Returns the first error of any split, fit or metric.
pub fn cross_validate<S: FoldStep>(
    step: &S,
    data: &Dataset,
    n_splits: usize,
    n_perm: usize,
    seed: Option<u64>,
) -> Result<Vec<FoldResult>> {
    let folds = KFold::new(n_splits)
        .with_seed(derive_optional_seed(seed, &[SPLIT_SALT]))
        .split(data.n_samples())?;

    let mut results = Vec::with_capacity(folds.len());
    for (f, fold) in (0u64..).zip(&folds) {
        let train = data.select(&fold.train);
        let val = data.select(&fold.val);
        let outcome = step.run_fold(&train, &val, derive_optional_seed(seed, &[f]))?;

        let reference = step
            .fit_model(&val, derive_optional_seed(seed, &[f, REFERENCE_SALT]))?
            .cluster(&val)?;
        let metrics = ClusteringMetrics::compute(&outcome.labels, &reference)?;
        let mut rng = rng_from(derive_optional_seed(seed, &[f, PERMUTATION_SALT]));
        let null = permuted_clustering_evaluation_metrics(&outcome.labels, &reference, n_perm, &mut rng)?;

        trace_debug!(fold = f, effective_k = outcome.effective_k, "fold finished");
        results.push(FoldResult {
            outcome,
            metrics,
            null,
        });
    }
    Ok(results)
}

/// Cross-validated evaluation of one configuration with one seed.
///
/// Each job gets a fresh random id for correlating failure logs. Jobs share
/// nothing mutable: the data and the factory are only borrowed.
pub struct OptimizationJob<'a, F> {
    id: Uuid,
    state: JobState,
    data: &'a Dataset,
    factory: &'a F,
    params: HyperParams,
    settings: JobSettings,
    seed: Option<u64>,
}

impl<'a, F: ModelFactory> OptimizationJob<'a, F> {
    /// Creates a job in the [`JobState::Created`] state.
    pub fn new(
        data: &'a Dataset,
        factory: &'a F,
        params: HyperParams,
        settings: JobSettings,
        seed: Option<u64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: JobState::Created,
            data,
            factory,
            params,
            settings,
            seed,
        }
    }

    /// The job's unique id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.state
    }

    /// The configuration under evaluation.
    #[must_use]
    pub fn params(&self) -> &HyperParams {
        &self.params
    }

    /// The job's base seed.
    #[must_use]
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Runs the job: configuration columns followed by fold-mean metrics.
    ///
    /// # Errors
    ///
    /// Any error of splitting, fitting or scoring is returned unchanged and
    /// leaves the job [`JobState::Failed`]; there is no retry.
    pub fn run(&mut self) -> Result<Row> {
        let _span = trace_span!("job", id = %self.id, k = self.params.k);
        self.state = JobState::Running;
        trace_debug!(params = %self.params, seed = ?self.seed, "job started");

        let result = self.evaluate();
        self.state = if result.is_ok() {
            JobState::Completed
        } else {
            JobState::Failed
        };
        trace_debug!(state = %self.state, "job finished");
        result
    }

    fn evaluate(&self) -> Result<Row> {
        self.settings.validate()?;
        let runner = FoldRunner::new(self.factory, &self.params, &self.settings);
        let step = ConsensusStep::new(runner, self.settings.n_consensus);
        let folds = cross_validate(
            &step,
            self.data,
            self.settings.n_splits,
            self.settings.n_perm,
            self.seed,
        )?;
        let mut row = self.params.to_row();
        row.extend(result::summarize(&folds, self.params.alpha)?);
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::*;
    use crate::model::MixtureModelFactory;

    fn blobs() -> Dataset {
        let data = Array3::from_shape_fn((24, 3, 2), |(i, t, f)| {
            (if i % 2 == 0 { -3.0 } else { 3.0 }) + 0.1 * (t + f) as f64
        });
        Dataset::unweighted(data).unwrap()
    }

    fn settings() -> JobSettings {
        JobSettings::default().with_n_epoch(3).with_n_pre_epoch(2).with_n_perm(10)
    }

    #[test]
    fn state_follows_the_run() {
        let data = blobs();
        let params = HyperParams::new(2, vec![8, 4], 1e-3, 4, 1.0);
        let mut job = OptimizationJob::new(&data, &MixtureModelFactory, params, settings(), Some(1));
        assert_eq!(job.state(), JobState::Created);
        let row = job.run().unwrap();
        assert_eq!(job.state(), JobState::Completed);
        assert_eq!(row.len(), HyperParams::COLUMNS.len() + METRIC_COLUMNS.len());
    }

    #[test]
    fn failing_job_is_marked_failed() {
        let data = blobs();
        let params = HyperParams::new(2, vec![8, 4], 1e-3, 4, 1.0);
        let mut job = OptimizationJob::new(
            &data,
            &MixtureModelFactory,
            params,
            settings().with_n_splits(30),
            Some(1),
        );
        assert!(matches!(job.run(), Err(Error::InvalidSplit { .. })));
        assert_eq!(job.state(), JobState::Failed);
    }

    #[test]
    fn zero_epochs_is_a_config_error() {
        let data = blobs();
        let params = HyperParams::new(2, vec![8, 4], 1e-3, 4, 1.0);
        let mut job =
            OptimizationJob::new(&data, &MixtureModelFactory, params, settings().with_n_epoch(0), Some(1));
        assert!(matches!(job.run(), Err(Error::InvalidConfig(_))));
        assert_eq!(job.state(), JobState::Failed);
    }

    #[test]
    fn settings_validation() {
        settings().validate().unwrap();
        for bad in [
            settings().with_n_epoch(0),
            settings().with_n_splits(1),
            settings().with_n_perm(0),
        ] {
            assert!(matches!(bad.validate(), Err(Error::InvalidConfig(_))), "{bad:?}");
        }
    }

    #[test]
    fn seeded_jobs_are_reproducible() {
        let data = blobs();
        let params = HyperParams::new(2, vec![8, 4], 1e-3, 4, 1.0);
        let run = || {
            OptimizationJob::new(&data, &MixtureModelFactory, params.clone(), settings(), Some(3))
                .run()
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn jobs_get_distinct_ids() {
        let data = blobs();
        let params = HyperParams::new(2, vec![8, 4], 1e-3, 4, 1.0);
        let a = OptimizationJob::new(&data, &MixtureModelFactory, params.clone(), settings(), None);
        let b = OptimizationJob::new(&data, &MixtureModelFactory, params, settings(), None);
        assert_ne!(a.id(), b.id());
    }
}
