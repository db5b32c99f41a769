//! Per-fold scalars and their reduction to one job row.

use crate::clustering::ClusteringMetrics;
use crate::error::{Error, Result};
use crate::model::Loss;
use crate::table::{Cell, Row};

/// Metric columns of a job row, in the order they are written.
pub const METRIC_COLUMNS: [&str; 16] = [
    "train_reconstruction_loss",
    "train_latent_loss",
    "train_total_loss",
    "test_reconstruction_loss",
    "test_latent_loss",
    "test_total_loss",
    "effective_k",
    "rand_index",
    "rand_index_null",
    "rand_index_diff",
    "adj_rand_index",
    "adj_rand_index_null",
    "adj_rand_index_diff",
    "prediction_strength",
    "prediction_strength_null",
    "prediction_strength_diff",
];

/// Column a trial is scored on.
pub const SCORE_COLUMN: &str = "prediction_strength_diff";

/// What one fold step produces: validation labels, realised cluster count
/// and losses.
#[derive(Clone, Debug, PartialEq)]
pub struct FoldOutcome {
    /// Predicted label per validation sample.
    pub labels: Vec<usize>,
    /// Distinct labels the fit used on its training data (mean over
    /// consensus repeats).
    pub effective_k: f64,
    /// Final-epoch training losses.
    pub train_loss: Loss,
    /// Losses on the validation data.
    pub test_loss: Loss,
}

/// A fold outcome scored against the fold's reference clustering.
#[derive(Clone, Debug, PartialEq)]
pub struct FoldResult {
    /// The fold step's output.
    pub outcome: FoldOutcome,
    /// Agreement with the reference clustering.
    pub metrics: ClusteringMetrics,
    /// Agreement of permuted labels with the reference clustering.
    pub null: ClusteringMetrics,
}

impl FoldResult {
    /// Scalar values aligned with [`METRIC_COLUMNS`].
    #[must_use]
    pub fn values(&self, alpha: f64) -> [f64; 16] {
        let FoldOutcome {
            effective_k,
            train_loss,
            test_loss,
            ..
        } = &self.outcome;
        let (real, null) = (&self.metrics, &self.null);
        [
            train_loss.reconstruction,
            train_loss.latent,
            train_loss.total(alpha),
            test_loss.reconstruction,
            test_loss.latent,
            test_loss.total(alpha),
            *effective_k,
            real.rand_index,
            null.rand_index,
            real.rand_index - null.rand_index,
            real.adj_rand_index,
            null.adj_rand_index,
            real.adj_rand_index - null.adj_rand_index,
            real.prediction_strength,
            null.prediction_strength,
            real.prediction_strength - null.prediction_strength,
        ]
    }
}

/// Arithmetic mean of every metric over the folds, as row cells.
///
/// # Errors
///
/// Returns [`Error::InvalidData`] if `results` is empty.
#[allow(clippy::cast_precision_loss)]
pub fn summarize(results: &[FoldResult], alpha: f64) -> Result<Row> {
    if results.is_empty() {
        return Err(Error::InvalidData("no fold results to summarize".into()));
    }
    let mut sums = [0.0; 16];
    for result in results {
        for (sum, value) in sums.iter_mut().zip(result.values(alpha)) {
            *sum += value;
        }
    }
    let n = results.len() as f64;
    Ok(METRIC_COLUMNS
        .iter()
        .zip(sums)
        .fold(Row::new(), |row, (&name, sum)| row.with(name, Cell::Float(sum / n))))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn result(train: f64, ps: f64, ps_null: f64) -> FoldResult {
        FoldResult {
            outcome: FoldOutcome {
                labels: vec![0, 1],
                effective_k: 2.0,
                train_loss: Loss {
                    reconstruction: train,
                    latent: 0.5,
                },
                test_loss: Loss::default(),
            },
            metrics: ClusteringMetrics {
                rand_index: 1.0,
                adj_rand_index: 1.0,
                prediction_strength: ps,
            },
            null: ClusteringMetrics {
                rand_index: 0.5,
                adj_rand_index: 0.0,
                prediction_strength: ps_null,
            },
        }
    }

    #[test]
    fn summary_is_the_fold_mean() {
        let row = summarize(&[result(1.0, 0.9, 0.3), result(3.0, 0.7, 0.5)], 2.0).unwrap();
        assert_eq!(row.columns().collect::<Vec<_>>(), METRIC_COLUMNS);
        assert_relative_eq!(row.get_f64("train_reconstruction_loss").unwrap(), 2.0);
        assert_relative_eq!(row.get_f64("train_total_loss").unwrap(), 3.0);
        assert_relative_eq!(row.get_f64(SCORE_COLUMN).unwrap(), 0.4);
        assert_relative_eq!(row.get_f64("rand_index_diff").unwrap(), 0.5);
    }

    #[test]
    fn empty_summary_is_an_error() {
        assert!(summarize(&[], 1.0).is_err());
    }
}
