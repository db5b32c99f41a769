//! Kernel density estimation for continuous parameters.
//!
//! The TPE sampler models the good and bad trial regions l(x) and g(x) with
//! Gaussian kernel density estimators.

use rand::Rng;

use crate::error::{Error, Result};

/// A Gaussian kernel density estimator over one dimension.
#[derive(Clone, Debug)]
pub(crate) struct KernelDensityEstimator {
    samples: Vec<f64>,
    bandwidth: f64,
}

impl KernelDensityEstimator {
    /// Creates a KDE with Scott's-rule bandwidth.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptySamples` if `samples` is empty.
    pub(crate) fn new(samples: Vec<f64>) -> Result<Self> {
        if samples.is_empty() {
            return Err(Error::EmptySamples);
        }
        let bandwidth = scotts_rule(&samples);
        Ok(Self { samples, bandwidth })
    }

    /// Creates a KDE with a fixed bandwidth.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptySamples` if `samples` is empty and
    /// `Error::InvalidBandwidth` if `bandwidth` is not positive.
    pub(crate) fn with_bandwidth(samples: Vec<f64>, bandwidth: f64) -> Result<Self> {
        if samples.is_empty() {
            return Err(Error::EmptySamples);
        }
        if bandwidth <= 0.0 {
            return Err(Error::InvalidBandwidth(bandwidth));
        }
        Ok(Self { samples, bandwidth })
    }

    /// Density at `x`: the mean of the Gaussian kernels.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn pdf(&self, x: f64) -> f64 {
        let n = self.samples.len() as f64;
        let inv_bandwidth = 1.0 / self.bandwidth;
        let normalization = inv_bandwidth / (2.0 * core::f64::consts::PI).sqrt();

        let density: f64 = self
            .samples
            .iter()
            .map(|&xi| {
                let z = (x - xi) * inv_bandwidth;
                normalization * (-0.5 * z * z).exp()
            })
            .sum();

        density / n
    }

    /// Draws from the estimate: a random kernel centre plus Gaussian noise.
    pub(crate) fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        let center = self.samples[rng.random_range(0..self.samples.len())];

        // Box-Muller; 1 - u keeps the log argument in (0, 1].
        let u1: f64 = 1.0 - rng.random::<f64>();
        let u2: f64 = rng.random();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * core::f64::consts::PI * u2).cos();
        center + z * self.bandwidth
    }

    #[cfg(test)]
    pub(crate) fn bandwidth(&self) -> f64 {
        self.bandwidth
    }
}

/// Scott's rule, h = n^(-1/5) * sigma, with a unit fallback for identical samples.
#[allow(clippy::cast_precision_loss)]
fn scotts_rule(samples: &[f64]) -> f64 {
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let std_dev = (samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
    if std_dev < f64::EPSILON {
        return 1.0;
    }
    n.powf(-0.2) * std_dev
}
