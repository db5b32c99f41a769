//! The single-fit fold step.

use super::{FoldStep, JobSettings};
use crate::clustering::effective_k;
use crate::data::Dataset;
use crate::error::Result;
use crate::hyperparams::HyperParams;
use crate::job::result::FoldOutcome;
use crate::model::{Model, ModelFactory, ModelSpec};

/// Fits one model per fold and reads labels and losses back from it.
pub struct FoldRunner<'a, F> {
    factory: &'a F,
    params: &'a HyperParams,
    settings: &'a JobSettings,
}

impl<'a, F: ModelFactory> FoldRunner<'a, F> {
    /// Creates a runner for one configuration.
    pub fn new(factory: &'a F, params: &'a HyperParams, settings: &'a JobSettings) -> Self {
        Self {
            factory,
            params,
            settings,
        }
    }
}

impl<F: ModelFactory> FoldStep for FoldRunner<'_, F> {
    type Model = F::Model;

    fn fit_model(&self, data: &Dataset, seed: Option<u64>) -> Result<F::Model> {
        let spec = ModelSpec::new(self.params, seed, self.settings.recurrent);
        let mut model = self.factory.build(data, &spec)?;
        model.pre_fit(self.settings.n_pre_epoch)?;
        model.fit(self.settings.n_epoch, self.settings.early_stopping)?;
        Ok(model)
    }

    #[allow(clippy::cast_precision_loss)]
    fn run_fold(&self, train: &Dataset, val: &Dataset, seed: Option<u64>) -> Result<FoldOutcome> {
        let model = self.fit_model(train, seed)?;
        let labels = model.cluster(val)?;
        let effective_k = effective_k(&model.cluster(train)?) as f64;
        Ok(FoldOutcome {
            labels,
            effective_k,
            train_loss: model.final_training_loss()?,
            test_loss: model.loss(val)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::*;
    use crate::model::MixtureModelFactory;

    #[test]
    fn outcome_covers_validation_samples() {
        let data = Array3::from_shape_fn((12, 3, 1), |(i, t, _)| {
            (if i % 2 == 0 { 0.0 } else { 4.0 }) + 0.1 * t as f64
        });
        let data = Dataset::unweighted(data).unwrap();
        let train = data.select(&(0..8).collect::<Vec<_>>());
        let val = data.select(&(8..12).collect::<Vec<_>>());

        let params = HyperParams::new(2, vec![4, 2], 1e-3, 4, 1.0);
        let settings = JobSettings::default().with_n_epoch(3);
        let runner = FoldRunner::new(&MixtureModelFactory, &params, &settings);
        let outcome = runner.run_fold(&train, &val, Some(5)).unwrap();

        assert_eq!(outcome.labels.len(), 4);
        assert!((1.0..=2.0).contains(&outcome.effective_k));
        assert!(outcome.train_loss.reconstruction.is_finite());
        assert!(outcome.test_loss.total(1.0).is_finite());
    }
}
