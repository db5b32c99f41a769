use ndarray::{Array2, ArrayView1, Zip};

use super::{EarlyStopping, Loss, Model, ModelFactory, ModelSpec};
use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::seed::rng_from;

const MIN_VARIANCE: f64 = 1e-6;
const MIN_MIXING_WEIGHT: f64 = 1e-10;

/// Builds [`MixtureModel`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct MixtureModelFactory;

impl ModelFactory for MixtureModelFactory {
    type Model = MixtureModel;

    fn build(&self, train: &Dataset, spec: &ModelSpec) -> Result<MixtureModel> {
        MixtureModel::new(train, spec)
    }
}

/// Mini-batch k-means mixture over flattened, mask-weighted time series.
///
/// Each sample is flattened to a `time × feature` vector. Distances only
/// count observed entries and are rescaled to the full dimension, so samples
/// with missing values are comparable to complete ones. `pre_fit` runs plain
/// k-means epochs; `fit` additionally re-estimates mixing weights and a
/// shared variance after each epoch, which lets components collapse.
///
/// Hidden layer widths and the recurrent flag of the [`ModelSpec`] do not
/// apply to this model and are ignored.
#[derive(Clone, Debug)]
pub struct MixtureModel {
    shape: (usize, usize),
    x: Array2<f64>,
    mask: Array2<f64>,
    batch_size: usize,
    learning_rate: f64,
    rng: fastrand::Rng,
    centroids: Array2<f64>,
    counts: Vec<f64>,
    log_weights: Vec<f64>,
    variance: f64,
    reconstruction_history: Vec<f64>,
    latent_history: Vec<f64>,
}

impl MixtureModel {
    /// Initialises a model on `train` with k-means++ seeding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidClusterCount`] if `spec.k` is zero or exceeds
    /// the number of training samples and [`Error::Model`] for a zero batch
    /// size or a non-positive learning rate.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(train: &Dataset, spec: &ModelSpec) -> Result<Self> {
        if spec.k == 0 || spec.k > train.n_samples() {
            return Err(Error::InvalidClusterCount {
                k: spec.k,
                n_samples: train.n_samples(),
            });
        }
        if spec.batch_size == 0 {
            return Err(Error::Model("batch size must be positive".into()));
        }
        if !(spec.learning_rate.is_finite() && spec.learning_rate > 0.0) {
            return Err(Error::Model(format!(
                "learning rate must be positive, got {}",
                spec.learning_rate
            )));
        }

        let (x, mask) = flatten(train)?;
        let mut rng = rng_from(spec.seed);
        let centroids = init_centroids(&x, &mask, spec.k, &mut rng);
        Ok(Self {
            shape: (train.n_time_points(), train.n_features()),
            x,
            mask,
            batch_size: spec.batch_size,
            learning_rate: spec.learning_rate,
            rng,
            centroids,
            counts: vec![0.0; spec.k],
            log_weights: vec![-(spec.k as f64).ln(); spec.k],
            variance: 1.0,
            reconstruction_history: Vec::new(),
            latent_history: Vec::new(),
        })
    }

    /// Cluster centres, one flattened row per component.
    #[must_use]
    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    /// Current mixing weights.
    #[must_use]
    pub fn mixing_weights(&self) -> Vec<f64> {
        self.log_weights.iter().map(|w| w.exp()).collect()
    }

    fn check_shape(&self, data: &Dataset) -> Result<()> {
        let shape = (data.n_time_points(), data.n_features());
        if shape == self.shape {
            Ok(())
        } else {
            Err(Error::Model(format!(
                "model was trained on {:?} (time, feature) samples, got {shape:?}",
                self.shape
            )))
        }
    }

    /// Best component for one sample and its rescaled distance.
    fn assign(&self, x: ArrayView1<'_, f64>, mask: ArrayView1<'_, f64>) -> (usize, f64) {
        let mut best = (0, f64::INFINITY, f64::INFINITY);
        for (c, centroid) in self.centroids.rows().into_iter().enumerate() {
            let distance = scaled_distance(x, mask, centroid);
            let score = distance / (2.0 * self.variance) - self.log_weights[c];
            if score < best.2 {
                best = (c, distance, score);
            }
        }
        (best.0, best.1)
    }

    fn epoch(&mut self, update_mixture: bool) {
        let mut order: Vec<usize> = (0..self.x.nrows()).collect();
        self.rng.shuffle(&mut order);

        for batch in order.chunks(self.batch_size) {
            let assignments: Vec<(usize, usize)> = batch
                .iter()
                .map(|&i| (i, self.assign(self.x.row(i), self.mask.row(i)).0))
                .collect();
            for (i, c) in assignments {
                self.counts[c] += 1.0;
                let eta = (1.0 / self.counts[c]).max(self.learning_rate).min(1.0);
                Zip::from(self.centroids.row_mut(c))
                    .and(self.x.row(i))
                    .and(self.mask.row(i))
                    .for_each(|m, &v, &w| {
                        if w > 0.0 {
                            *m += eta * (v - *m);
                        }
                    });
            }
        }

        if update_mixture {
            self.update_mixture();
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn update_mixture(&mut self) {
        let n = self.x.nrows();
        let mut sizes = vec![0.0; self.centroids.nrows()];
        let mut residual = 0.0;
        let mut observed = 0.0;
        for i in 0..n {
            let (c, _) = self.assign(self.x.row(i), self.mask.row(i));
            sizes[c] += 1.0;
            let (sum, count) = masked_sq_error(self.x.row(i), self.mask.row(i), self.centroids.row(c));
            residual += sum;
            observed += count;
        }
        self.log_weights = sizes
            .iter()
            .map(|s| (s / n as f64).max(MIN_MIXING_WEIGHT).ln())
            .collect();
        if observed > 0.0 {
            self.variance = (residual / observed).max(MIN_VARIANCE);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn evaluate(&self, x: &Array2<f64>, mask: &Array2<f64>) -> Loss {
        let n = x.nrows();
        let mut loss = Loss::default();
        for i in 0..n {
            let (c, distance) = self.assign(x.row(i), mask.row(i));
            loss.reconstruction += distance;
            loss.latent -= self.log_weights[c];
        }
        Loss {
            reconstruction: loss.reconstruction / n as f64,
            latent: loss.latent / n as f64,
        }
    }
}

impl Model for MixtureModel {
    fn pre_fit(&mut self, n_epoch: usize) -> Result<()> {
        for _ in 0..n_epoch {
            self.epoch(false);
        }
        Ok(())
    }

    fn fit(&mut self, n_epoch: usize, early_stopping: Option<EarlyStopping>) -> Result<()> {
        for _ in 0..n_epoch {
            self.epoch(true);
            let loss = self.evaluate(&self.x, &self.mask);
            if !loss.reconstruction.is_finite() {
                return Err(Error::Model("training loss diverged".into()));
            }
            self.reconstruction_history.push(loss.reconstruction);
            self.latent_history.push(loss.latent);
            if early_stopping.is_some_and(|rule| rule.should_stop(&self.reconstruction_history)) {
                break;
            }
        }
        Ok(())
    }

    fn cluster(&self, data: &Dataset) -> Result<Vec<usize>> {
        self.check_shape(data)?;
        let (x, mask) = flatten(data)?;
        Ok((0..x.nrows())
            .map(|i| self.assign(x.row(i), mask.row(i)).0)
            .collect())
    }

    fn loss(&self, data: &Dataset) -> Result<Loss> {
        self.check_shape(data)?;
        let (x, mask) = flatten(data)?;
        Ok(self.evaluate(&x, &mask))
    }

    fn reconstruction_loss_history(&self) -> &[f64] {
        &self.reconstruction_history
    }

    fn latent_loss_history(&self) -> &[f64] {
        &self.latent_history
    }
}

/// Samples as rows of `time × feature` values, with the matching mask.
fn flatten(data: &Dataset) -> Result<(Array2<f64>, Array2<f64>)> {
    let n = data.n_samples();
    let d = data.n_time_points() * data.n_features();
    let x = Array2::from_shape_vec((n, d), data.data().iter().copied().collect())
        .map_err(|e| Error::Model(e.to_string()))?;
    let mask = match data.weights() {
        Some(w) => Array2::from_shape_vec((n, d), w.iter().copied().collect())
            .map_err(|e| Error::Model(e.to_string()))?,
        None => Array2::ones((n, d)),
    };
    Ok((x, mask))
}

/// Squared error over observed entries and the number of observed entries.
fn masked_sq_error(
    x: ArrayView1<'_, f64>,
    mask: ArrayView1<'_, f64>,
    centroid: ArrayView1<'_, f64>,
) -> (f64, f64) {
    let mut sum = 0.0;
    let mut count = 0.0;
    Zip::from(x).and(mask).and(centroid).for_each(|&v, &w, &m| {
        sum += w * (v - m) * (v - m);
        count += w;
    });
    (sum, count)
}

#[allow(clippy::cast_precision_loss)]
fn scaled_distance(
    x: ArrayView1<'_, f64>,
    mask: ArrayView1<'_, f64>,
    centroid: ArrayView1<'_, f64>,
) -> f64 {
    let (sum, count) = masked_sq_error(x, mask, centroid);
    if count > 0.0 {
        sum * x.len() as f64 / count
    } else {
        0.0
    }
}

/// k-means++ seeding.
fn init_centroids(x: &Array2<f64>, mask: &Array2<f64>, k: usize, rng: &mut fastrand::Rng) -> Array2<f64> {
    let n = x.nrows();
    let mut chosen = vec![rng.usize(..n)];
    let mut nearest: Vec<f64> = (0..n)
        .map(|i| scaled_distance(x.row(i), mask.row(i), x.row(chosen[0])))
        .collect();

    while chosen.len() < k {
        let total: f64 = nearest.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.f64() * total;
            nearest
                .iter()
                .position(|&d| {
                    target -= d;
                    d > 0.0 && target <= 0.0
                })
                .unwrap_or(n - 1)
        } else {
            rng.usize(..n)
        };
        chosen.push(next);
        for (i, slot) in nearest.iter_mut().enumerate() {
            *slot = slot.min(scaled_distance(x.row(i), mask.row(i), x.row(next)));
        }
    }

    let mut centroids = Array2::zeros((k, x.ncols()));
    for (row, &i) in chosen.iter().enumerate() {
        centroids.row_mut(row).assign(&x.row(i));
    }
    centroids
}
