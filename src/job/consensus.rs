//! Repeated fold steps fused by consensus clustering.

use super::FoldStep;
use crate::clustering::consensus_clustering;
use crate::data::Dataset;
use crate::error::Result;
use crate::job::result::FoldOutcome;
use crate::model::Loss;
use crate::seed::derive_optional_seed;

/// Wraps a fold step and runs it `n_consensus` times per fold.
///
/// Repeat `c` gets `derive(seed, [c])`, or fresh entropy when the fold is
/// unseeded. Scalars are averaged; labels are fused with
/// [`consensus_clustering`] at the rounded mean effective K. With
/// `n_consensus <= 1` the inner step runs once, unchanged.
pub struct ConsensusStep<S> {
    inner: S,
    n_consensus: usize,
}

impl<S: FoldStep> ConsensusStep<S> {
    /// Wraps `inner`.
    pub fn new(inner: S, n_consensus: usize) -> Self {
        Self { inner, n_consensus }
    }
}

impl<S: FoldStep> FoldStep for ConsensusStep<S> {
    type Model = S::Model;

    fn fit_model(&self, data: &Dataset, seed: Option<u64>) -> Result<S::Model> {
        self.inner.fit_model(data, seed)
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn run_fold(&self, train: &Dataset, val: &Dataset, seed: Option<u64>) -> Result<FoldOutcome> {
        if self.n_consensus <= 1 {
            return self.inner.run_fold(train, val, seed);
        }

        let mut runs = Vec::with_capacity(self.n_consensus);
        let mut effective_k = 0.0;
        let mut train_loss = Loss::default();
        let mut test_loss = Loss::default();
        for c in 0..self.n_consensus {
            let outcome = self
                .inner
                .run_fold(train, val, derive_optional_seed(seed, &[c as u64]))?;
            effective_k += outcome.effective_k;
            train_loss.reconstruction += outcome.train_loss.reconstruction;
            train_loss.latent += outcome.train_loss.latent;
            test_loss.reconstruction += outcome.test_loss.reconstruction;
            test_loss.latent += outcome.test_loss.latent;
            runs.push(outcome.labels);
        }

        let n = self.n_consensus as f64;
        let effective_k = effective_k / n;
        let target_k = (effective_k.round() as usize).clamp(1, val.n_samples());
        Ok(FoldOutcome {
            labels: consensus_clustering(&runs, target_k)?,
            effective_k,
            train_loss: Loss {
                reconstruction: train_loss.reconstruction / n,
                latent: train_loss.latent / n,
            },
            test_loss: Loss {
                reconstruction: test_loss.reconstruction / n,
                latent: test_loss.latent / n,
            },
        })
    }
}
