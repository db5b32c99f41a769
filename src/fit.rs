//! Fitting a single configuration on the full data set.

use core::fmt;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::data::Dataset;
use crate::error::Result;
use crate::hyperparams::HyperParams;
use crate::job::{ConsensusStep, FoldRunner, FoldStep, JobSettings};
use crate::model::Loss;

/// Clustering and losses of one configuration fitted on all samples.
#[derive(Clone, Debug, PartialEq)]
pub struct FitReport {
    /// The fitted configuration.
    pub params: HyperParams,
    /// Label per sample; the consensus labels when `n_consensus > 1`.
    pub labels: Vec<usize>,
    /// Final training losses, averaged over consensus repeats.
    pub loss: Loss,
    /// Distinct labels used, averaged over consensus repeats.
    pub effective_k: f64,
}

impl FitReport {
    /// Samples per cluster label.
    #[must_use]
    pub fn proportions(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for &label in &self.labels {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    /// Total loss with the configuration's alpha.
    #[must_use]
    pub fn total_loss(&self) -> f64 {
        self.loss.total(self.params.alpha)
    }

    /// Report file name for this configuration under `settings`.
    #[must_use]
    pub fn file_name(&self, settings: &JobSettings) -> String {
        let hidden: Vec<String> = self.params.n_hidden.iter().map(ToString::to_string).collect();
        format!(
            "custom_k{}_n_hidden{}_learning_rate{}_batch_size{}_n_epoch{}_n_consensus{}.txt",
            self.params.k,
            hidden.join("_"),
            self.params.learning_rate,
            self.params.batch_size,
            settings.n_epoch,
            settings.n_consensus
        )
    }

    /// Appends the report to `output_dir/{file_name}` and returns the path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the directory or file
    /// cannot be written.
    pub fn append_to_dir(&self, output_dir: &Path, settings: &JobSettings) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(self.file_name(settings));
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
        write!(file, "{self}")?;
        Ok(path)
    }
}

impl fmt::Display for FitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Proportion: {:?}", self.proportions())?;
        writeln!(f, "Reconstruction loss: {}", self.loss.reconstruction)?;
        writeln!(f, "Lat loss: {}", self.loss.latent)?;
        writeln!(f, "Total loss: {}", self.total_loss())?;
        writeln!(f, "{:?}", self.labels)?;
        writeln!(f)
    }
}

/// Fits `params` on all of `data` and clusters it.
///
/// With `settings.n_consensus > 1` the fit is repeated with seeds
/// `derive(seed, [c])` and the labels fused by consensus clustering.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) for
/// settings that cannot train and propagates model and clustering errors.
pub fn fit_full<F: crate::model::ModelFactory>(
    factory: &F,
    data: &Dataset,
    params: &HyperParams,
    settings: &JobSettings,
    seed: Option<u64>,
) -> Result<FitReport> {
    settings.validate()?;
    let runner = FoldRunner::new(factory, params, settings);
    let step = ConsensusStep::new(runner, settings.n_consensus);
    let outcome = step.run_fold(data, data, seed)?;
    trace_info!(k = params.k, effective_k = outcome.effective_k, "full fit finished");
    Ok(FitReport {
        params: params.clone(),
        labels: outcome.labels,
        loss: outcome.train_loss,
        effective_k: outcome.effective_k,
    })
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::*;
    use crate::model::MixtureModelFactory;

    fn data() -> Dataset {
        let data = Array3::from_shape_fn((16, 3, 2), |(i, t, _)| {
            (if i < 8 { -2.0 } else { 2.0 }) + 0.05 * t as f64
        });
        Dataset::unweighted(data).unwrap()
    }

    #[test]
    fn consensus_fit_labels_every_sample() {
        let params = HyperParams::new(2, vec![16, 4], 1e-3, 4, 1.0);
        let settings = JobSettings::default().with_n_epoch(3).with_n_consensus(3);
        let report = fit_full(&MixtureModelFactory, &data(), &params, &settings, Some(11)).unwrap();
        assert_eq!(report.labels.len(), 16);
        assert_eq!(report.proportions().values().sum::<usize>(), 16);
        assert!(report.total_loss().is_finite());
    }

    #[test]
    fn zero_epochs_is_rejected() {
        let params = HyperParams::new(2, vec![16, 4], 1e-3, 4, 1.0);
        let settings = JobSettings::default().with_n_epoch(0);
        assert!(matches!(
            fit_full(&MixtureModelFactory, &data(), &params, &settings, Some(1)),
            Err(crate::Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn report_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let params = HyperParams::new(2, vec![16, 4], 1e-3, 4, 1.0);
        let settings = JobSettings::default().with_n_epoch(2);
        let report = fit_full(&MixtureModelFactory, &data(), &params, &settings, Some(1)).unwrap();
        let path = report.append_to_dir(dir.path(), &settings).unwrap();
        report.append_to_dir(dir.path(), &settings).unwrap();

        assert!(path.ends_with("custom_k2_n_hidden16_4_learning_rate0.001_batch_size4_n_epoch2_n_consensus1.txt"));
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.matches("Total loss:").count(), 2);
    }
}
