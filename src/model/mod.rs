//! The clustering model contract consumed by the optimization jobs.
//!
//! The orchestration layer never looks inside a model: it builds one per fit
//! through a [`ModelFactory`], trains it, and reads back labels and losses.
//! [`MixtureModel`] is a small reference implementation that honours the
//! contract without a neural network.

mod mixture;

use serde::{Deserialize, Serialize};

pub use mixture::{MixtureModel, MixtureModelFactory};

use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::hyperparams::HyperParams;

/// Reconstruction and latent loss of a model on some data.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Loss {
    /// Reconstruction term.
    pub reconstruction: f64,
    /// Latent (clustering prior) term.
    pub latent: f64,
}

impl Loss {
    /// `reconstruction + alpha * latent`.
    #[must_use]
    pub fn total(&self, alpha: f64) -> f64 {
        self.reconstruction + alpha * self.latent
    }
}

/// Early-stopping rule for [`Model::fit`].
///
/// Training stops once the relative improvement of the reconstruction loss
/// over the last `batch_size` epochs falls below `ratio`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EarlyStopping {
    /// Minimum relative improvement to keep training.
    pub ratio: f64,
    /// Window, in epochs, over which the improvement is measured.
    pub batch_size: usize,
}

impl EarlyStopping {
    /// Creates a rule with the default five-epoch window.
    #[must_use]
    pub fn new(ratio: f64) -> Self {
        Self { ratio, batch_size: 5 }
    }

    /// Whether training should stop given the loss history so far.
    #[must_use]
    pub fn should_stop(&self, history: &[f64]) -> bool {
        let n = history.len();
        if self.batch_size == 0 || n <= self.batch_size {
            return false;
        }
        let previous = history[n - 1 - self.batch_size];
        let current = history[n - 1];
        if previous.abs() < f64::EPSILON {
            return true;
        }
        (previous - current) / previous.abs() < self.ratio
    }
}

/// Everything a factory needs to construct one model instance.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelSpec {
    /// Hidden layer widths.
    pub n_hidden: Vec<usize>,
    /// Number of mixture components.
    pub k: usize,
    /// Seed for this fit; `None` draws fresh entropy.
    pub seed: Option<u64>,
    /// Learning rate.
    pub learning_rate: f64,
    /// Mini-batch size.
    pub batch_size: usize,
    /// Latent loss weight.
    pub alpha: f64,
    /// Whether the encoder/decoder are recurrent.
    pub recurrent: bool,
}

impl ModelSpec {
    /// Spec for fitting `params` with `seed`.
    #[must_use]
    pub fn new(params: &HyperParams, seed: Option<u64>, recurrent: bool) -> Self {
        Self {
            n_hidden: params.n_hidden.clone(),
            k: params.k,
            seed,
            learning_rate: params.learning_rate,
            batch_size: params.batch_size,
            alpha: params.alpha,
            recurrent,
        }
    }
}

/// A trainable clustering model.
pub trait Model {
    /// Pre-trains the model (e.g. the autoencoder part) for `n_epoch` epochs.
    ///
    /// # Errors
    ///
    /// Implementation-defined training failures.
    fn pre_fit(&mut self, n_epoch: usize) -> Result<()>;

    /// Trains the full model for up to `n_epoch` epochs.
    ///
    /// # Errors
    ///
    /// Implementation-defined training failures.
    fn fit(&mut self, n_epoch: usize, early_stopping: Option<EarlyStopping>) -> Result<()>;

    /// Assigns every sample of `data` to a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is incompatible with the trained model.
    fn cluster(&self, data: &Dataset) -> Result<Vec<usize>>;

    /// Evaluates the losses on `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is incompatible with the trained model.
    fn loss(&self, data: &Dataset) -> Result<Loss>;

    /// Per-epoch training reconstruction loss of [`Model::fit`].
    fn reconstruction_loss_history(&self) -> &[f64];

    /// Per-epoch training latent loss of [`Model::fit`].
    fn latent_loss_history(&self) -> &[f64];

    /// Final-epoch training losses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Model`] if the model has not been fitted.
    fn final_training_loss(&self) -> Result<Loss> {
        match (
            self.reconstruction_loss_history().last(),
            self.latent_loss_history().last(),
        ) {
            (Some(&reconstruction), Some(&latent)) => Ok(Loss {
                reconstruction,
                latent,
            }),
            _ => Err(Error::Model("model has no training loss history".into())),
        }
    }
}

/// Builds model instances; shared by every worker of a sweep.
pub trait ModelFactory: Send + Sync {
    /// The model type produced.
    type Model: Model;

    /// Constructs an untrained model bound to the training data.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec cannot be realised on `train`.
    fn build(&self, train: &Dataset, spec: &ModelSpec) -> Result<Self::Model>;
}
