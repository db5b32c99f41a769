#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Cross-validated, consensus-clustering Bayesian hyperparameter search for
//! VaDER-style clustering models of multivariate time series with missing
//! values.
//!
//! The crate does not train a neural network itself. It orchestrates many
//! stochastic fits of a pluggable [`Model`](model::Model): K-fold
//! cross-validation of one configuration, consensus clustering over repeated
//! fits, permutation-null baselines for every agreement metric, and a
//! per-cluster-count Bayesian search whose trials survive individual job
//! failures.
//!
//! # Getting Started
//!
//! Evaluate one configuration with the bundled reference model:
//!
//! ```
//! use ndarray::Array3;
//! use vader_hpopt::job::{JobSettings, OptimizationJob};
//! use vader_hpopt::model::MixtureModelFactory;
//! use vader_hpopt::{Dataset, HyperParams};
//!
//! let data = Array3::from_shape_fn((20, 4, 2), |(i, t, _)| {
//!     (if i % 2 == 0 { -1.0 } else { 1.0 }) + 0.1 * t as f64
//! });
//! let data = Dataset::unweighted(data).unwrap();
//! let params = HyperParams::new(2, vec![32, 8], 1e-3, 4, 1.0);
//! let settings = JobSettings::default().with_n_epoch(5).with_n_perm(20);
//!
//! let mut job = OptimizationJob::new(&data, &MixtureModelFactory, params, settings, Some(42));
//! let row = job.run().unwrap();
//! assert!(row.get_f64("prediction_strength_diff").is_some());
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Dataset`] | Samples × time points × features, with an optional 0/1 weight mask. |
//! | [`clustering`] | Rand index, ARI, prediction strength, permutation nulls and consensus clustering. |
//! | [`OptimizationJob`](job::OptimizationJob) | K-fold evaluation of one [`HyperParams`] with one seed. |
//! | [`BayesianOptimizer`](sweep::BayesianOptimizer) | The sweep: one [`Study`] per candidate K, repeats per trial, failure containment. |
//! | [`Study`] / [`Trial`] | The in-crate trial suggester with random and TPE samplers. |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at job, trial and sweep boundaries | on |
//! | `cli` | The `vader-hpopt` binary (`clap`, `tracing-subscriber`, `anyhow`) | on |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::error!` event when the `tracing` feature is enabled.
#[cfg(feature = "tracing")]
macro_rules! trace_error {
    ($($arg:tt)*) => { tracing::error!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_error {
    ($($arg:tt)*) => {};
}

/// Enter an info-level span for the rest of the scope. Evaluates to `()`
/// without the `tracing` feature. Do not hold the guard across `.await`.
#[cfg(feature = "tracing")]
macro_rules! trace_span {
    ($($arg:tt)*) => { tracing::info_span!($($arg)*).entered() };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_span {
    ($($arg:tt)*) => {
        ()
    };
}

pub mod clustering;
pub mod cv;
mod data;
mod distribution;
mod error;
pub mod fit;
mod hyperparams;
pub mod job;
mod kde;
pub mod model;
pub mod objective;
mod param;
pub mod sampler;
mod seed;
pub mod storage;
pub mod study;
pub mod sweep;
pub mod table;
mod trial;
mod types;

pub use data::Dataset;
pub use distribution::{Distribution, FloatDistribution, IntDistribution};
pub use error::{Error, Result};
pub use hyperparams::HyperParams;
pub use objective::Objective;
pub use param::ParamValue;
pub use seed::{derive_optional_seed, derive_seed};
pub use study::{Study, Trial};
pub use types::{Direction, JobState, TrialState};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use vader_hpopt::prelude::*;
/// ```
pub mod prelude {
    pub use crate::clustering::{
        ClusteringMetrics, adjusted_rand_index, consensus_clustering,
        permuted_clustering_evaluation_metrics, prediction_strength, rand_index,
    };
    pub use crate::data::Dataset;
    pub use crate::error::{Error, Result};
    pub use crate::hyperparams::HyperParams;
    pub use crate::job::{JobSettings, OptimizationJob};
    pub use crate::model::{MixtureModelFactory, Model, ModelFactory};
    pub use crate::objective::Objective;
    pub use crate::sampler::random::RandomSampler;
    pub use crate::sampler::tpe::TpeSampler;
    pub use crate::sampler::{CompletedTrial, Sampler};
    pub use crate::storage::{JournalStorage, MemoryStorage, Storage};
    pub use crate::study::{Study, Trial};
    pub use crate::sweep::{BayesianOptimizer, OptimizerConfig};
    pub use crate::types::{Direction, JobState, TrialState};
}
