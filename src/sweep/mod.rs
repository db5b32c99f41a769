//! Bayesian hyperparameter search over candidate cluster counts.
//!
//! For every K in the configured list a [`Study`] maximizes the mean
//! prediction-strength differential of a trial's repeated jobs. Candidate
//! K values run concurrently, as do trials within one K; both levels are
//! bounded by `n_proc`. Every job is contained: failures leave a log file and
//! a placeholder row, and the sweep carries on.
//!
//! Output layout under `output_folder`:
//!
//! | Path | Content |
//! |------|---------|
//! | `trials/k{K}_trial{N}.csv` | one row per repeat of a trial, appended as jobs finish |
//! | `repeats/repeat_{i}.csv` | trial rows regrouped by repeat index |
//! | `failed_jobs/{job_id}.log` | error chain of one failed job |
//! | `studies/VaDER_k{K}.jsonl` | suggester history, when resuming is enabled |
//! | `best_scores_{run_id}.csv` | best trial per K |
//! | `trials_{run_id}.csv` | every trial of every K |

mod config;
mod failure;
mod objective;
mod report;

use core::sync::atomic::{AtomicUsize, Ordering};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub use config::{OptimizerConfig, SECONDS_IN_DAY, SamplerKind, SearchSpace};
pub use failure::{ContainedJob, run_contained};
pub use objective::{trial_columns, trial_score};
pub use report::{KSummary, best_score_columns, regroup_repeats, write_all_trials, write_best_scores};

use self::objective::TrialObjective;
use crate::cv::KFold;
use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::model::ModelFactory;
use crate::sampler::Sampler;
use crate::sampler::random::RandomSampler;
use crate::sampler::tpe::TpeSampler;
use crate::seed::derive_optional_seed;
use crate::storage::{JournalStorage, MemoryStorage, Storage};
use crate::study::Study;
use crate::types::Direction;

/// What a finished sweep reports back.
#[derive(Clone, Debug)]
pub struct SweepSummary {
    /// Identifier embedded in the output file names.
    pub run_id: String,
    /// One entry per candidate K, in `k_list` order.
    pub per_k: Vec<KSummary>,
    /// Jobs that failed during this run, over all K.
    pub n_failed_jobs: usize,
    /// The best-scores table.
    pub best_scores_path: PathBuf,
    /// The all-trials table.
    pub all_trials_path: PathBuf,
    /// The repeat files written.
    pub repeat_files: Vec<PathBuf>,
}

/// Drives the search for every candidate cluster count.
///
/// # Examples
///
/// ```no_run
/// use vader_hpopt::Dataset;
/// use vader_hpopt::model::MixtureModelFactory;
/// use vader_hpopt::sweep::{BayesianOptimizer, OptimizerConfig};
///
/// let data = Dataset::read_flat_csv("Xnorm.csv", 5, true).unwrap();
/// let config = OptimizerConfig::default()
///     .with_n_trials(20)
///     .with_n_proc(4)
///     .with_seed(Some(42))
///     .with_output_folder("results");
/// let summary = BayesianOptimizer::new(config, MixtureModelFactory)
///     .unwrap()
///     .run_blocking(data)
///     .unwrap();
/// println!("{} failed jobs", summary.n_failed_jobs);
/// ```
pub struct BayesianOptimizer<F> {
    config: Arc<OptimizerConfig>,
    factory: Arc<F>,
}

impl<F: ModelFactory + 'static> BayesianOptimizer<F> {
    /// Creates an optimizer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration does not validate.
    pub fn new(config: OptimizerConfig, factory: F) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            factory: Arc::new(factory),
        })
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Runs the sweep on the calling thread with a fresh tokio runtime.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub fn run_blocking(&self, data: Dataset) -> Result<SweepSummary> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run(Arc::new(data)))
    }

    /// Runs the sweep.
    ///
    /// Output directories are created if missing and never cleared. Data
    /// that cannot be split into `n_splits` folds aborts before any job is
    /// scheduled. Job failures do not fail the sweep; they are counted in
    /// the summary.
    ///
    /// # Errors
    ///
    /// Returns data errors, I/O and CSV errors of the sweep-level files,
    /// suggester errors and [`Error::TaskError`] if a worker task panics.
    pub async fn run(&self, data: Arc<Dataset>) -> Result<SweepSummary> {
        let config = &self.config;
        let run_id = config.run_id();
        trace_info!(run_id = %run_id, shape = ?data.data().shape(), "optimization started");

        KFold::new(config.n_splits).split(data.n_samples())?;
        std::fs::create_dir_all(config.trials_dir())?;
        std::fs::create_dir_all(config.repeats_dir())?;
        std::fs::create_dir_all(config.failed_jobs_dir())?;
        if config.resume {
            std::fs::create_dir_all(config.studies_dir())?;
        }

        let semaphore = Arc::new(Semaphore::new(config.n_proc));
        let mut join_set = JoinSet::new();
        for (index, &k) in config.k_list.iter().enumerate() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| Error::TaskError(e.to_string()))?;
            let data = Arc::clone(&data);
            let factory = Arc::clone(&self.factory);
            let config = Arc::clone(config);
            join_set.spawn(async move {
                let summary = search_k(k, data, factory, config).await;
                drop(permit);
                (index, summary)
            });
        }

        let mut per_k: Vec<Option<KSummary>> = vec![None; config.k_list.len()];
        while let Some(joined) = join_set.join_next().await {
            let (index, summary) = joined.map_err(|e| Error::TaskError(e.to_string()))?;
            per_k[index] = Some(summary?);
        }
        let per_k: Vec<KSummary> = per_k.into_iter().flatten().collect();

        let best_scores_path = config.best_scores_path();
        write_best_scores(&best_scores_path, &per_k)?;
        let all_trials_path = config.all_trials_path();
        write_all_trials(&all_trials_path, &per_k)?;
        let repeat_files = regroup_repeats(&config.trials_dir(), &config.repeats_dir(), config.n_repeats)?;

        let n_failed_jobs = per_k.iter().map(|s| s.n_failed_jobs).sum();
        trace_info!(path = %best_scores_path.display(), "optimization finished");
        if n_failed_jobs > 0 {
            trace_warn!(
                n_failed_jobs,
                dir = %config.failed_jobs_dir().display(),
                "some jobs failed"
            );
        }

        Ok(SweepSummary {
            run_id,
            per_k,
            n_failed_jobs,
            best_scores_path,
            all_trials_path,
            repeat_files,
        })
    }
}

/// Searches one candidate K to the trial budget or the timeout.
async fn search_k<F: ModelFactory + 'static>(
    k: usize,
    data: Arc<Dataset>,
    factory: Arc<F>,
    config: Arc<OptimizerConfig>,
) -> Result<KSummary> {
    trace_info!(k, "search started");
    let study = study_for(k, &config)?;
    let failed_jobs = Arc::new(AtomicUsize::new(0));
    let objective = TrialObjective {
        k,
        data,
        factory,
        config: Arc::clone(&config),
        started: Instant::now(),
        failed_jobs: Arc::clone(&failed_jobs),
    };

    match study
        .optimize_parallel(config.n_trials, config.n_proc, objective)
        .await
    {
        Ok(()) | Err(Error::NoCompletedTrials) => {}
        Err(e) => return Err(e),
    }

    let best = study.best_trial().ok();
    if let Some(_best) = &best {
        trace_info!(k, trial = _best.id, best_value = ?_best.value, "best trial");
    }
    Ok(KSummary {
        k,
        best,
        trials: study.trials(),
        n_trials: study.n_trials(),
        n_failed_jobs: failed_jobs.load(Ordering::Relaxed),
    })
}

fn study_for(k: usize, config: &OptimizerConfig) -> Result<Study> {
    let seed = derive_optional_seed(config.seed, &[k as u64]);
    let sampler: Arc<dyn Sampler> = match config.sampler {
        SamplerKind::Tpe => Arc::new(TpeSampler::builder().maybe_seed(seed).build()?),
        SamplerKind::Random => Arc::new(match seed {
            Some(seed) => RandomSampler::with_seed(seed),
            None => RandomSampler::new(),
        }),
    };
    let storage: Arc<dyn Storage> = if config.resume {
        Arc::new(JournalStorage::open(config.study_path(k))?)
    } else {
        Arc::new(MemoryStorage::new())
    };
    Ok(Study::from_parts(Direction::Maximize, sampler, storage))
}
