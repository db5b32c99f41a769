//! Tree-Parzen Estimator (TPE) sampler implementation.
//!
//! TPE models the objective with two densities per parameter: l(x) over the
//! values of the best trials and g(x) over the rest. New values are drawn
//! from l(x) and the candidate maximizing l(x)/g(x) wins.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::distribution::Distribution;
use crate::error::{Error, Result};
use crate::kde::KernelDensityEstimator;
use crate::param::ParamValue;
use crate::sampler::{CompletedTrial, Sampler};
use crate::types::{Direction, TrialState};

/// A univariate Tree-Parzen Estimator sampler.
///
/// Until `n_startup_trials` finished trials carry a parameter, that
/// parameter is sampled uniformly. Afterwards the trials are ranked by value
/// (undefined values last), the best `gamma` fraction forms the good group,
/// and `n_ei_candidates` draws from the good-group KDE compete on l(x)/g(x).
///
/// # Examples
///
/// ```
/// use vader_hpopt::sampler::tpe::TpeSampler;
///
/// let sampler = TpeSampler::builder()
///     .gamma(0.15)
///     .n_startup_trials(5)
///     .seed(42)
///     .build()
///     .unwrap();
/// ```
pub struct TpeSampler {
    gamma: f64,
    n_startup_trials: usize,
    n_ei_candidates: usize,
    kde_bandwidth: Option<f64>,
    rng: Mutex<StdRng>,
}

impl TpeSampler {
    /// Creates a sampler with default settings.
    ///
    /// - gamma: 0.25
    /// - `n_startup_trials`: 10
    /// - `n_ei_candidates`: 24
    /// - bandwidth: Scott's rule
    #[must_use]
    pub fn new() -> Self {
        Self {
            gamma: 0.25,
            n_startup_trials: 10,
            n_ei_candidates: 24,
            kde_bandwidth: None,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Creates a builder.
    #[must_use]
    pub fn builder() -> TpeSamplerBuilder {
        TpeSamplerBuilder::new()
    }

    /// Splits values into good and bad groups by trial rank.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn split(&self, mut observed: Vec<(f64, f64)>) -> (Vec<f64>, Vec<f64>) {
        observed.sort_by(|a, b| a.0.total_cmp(&b.0));
        let n_good = ((observed.len() as f64 * self.gamma).ceil() as usize)
            .max(1)
            .min(observed.len() - 1);
        let bad = observed.split_off(n_good);
        (
            observed.into_iter().map(|(_, v)| v).collect(),
            bad.into_iter().map(|(_, v)| v).collect(),
        )
    }

    fn kde(&self, samples: Vec<f64>) -> Result<KernelDensityEstimator> {
        match self.kde_bandwidth {
            Some(bw) => KernelDensityEstimator::with_bandwidth(samples, bw),
            None => KernelDensityEstimator::new(samples),
        }
    }

    /// TPE draw in internal (possibly log) space; `None` if a KDE cannot be fit.
    fn sample_tpe_float(
        &self,
        low: f64,
        high: f64,
        log_scale: bool,
        good: Vec<f64>,
        bad: Vec<f64>,
        rng: &mut StdRng,
    ) -> Option<f64> {
        let to_internal = |v: f64| if log_scale { v.ln() } else { v };
        let (internal_low, internal_high) = (to_internal(low), to_internal(high));
        let l_kde = self.kde(good.into_iter().map(to_internal).collect()).ok()?;
        let g_kde = self.kde(bad.into_iter().map(to_internal).collect()).ok()?;

        let mut best_candidate = internal_low;
        let mut best_ratio = f64::NEG_INFINITY;
        for _ in 0..self.n_ei_candidates {
            let candidate = l_kde.sample(rng).clamp(internal_low, internal_high);
            let l_density = l_kde.pdf(candidate);
            let g_density = g_kde.pdf(candidate);
            let ratio = if g_density < f64::EPSILON {
                if l_density > f64::EPSILON {
                    f64::INFINITY
                } else {
                    0.0
                }
            } else {
                l_density / g_density
            };
            if ratio > best_ratio {
                best_ratio = ratio;
                best_candidate = candidate;
            }
        }

        let value = if log_scale {
            best_candidate.exp()
        } else {
            best_candidate
        };
        Some(value.clamp(low, high))
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn sample_uniform(distribution: &Distribution, rng: &mut StdRng) -> ParamValue {
        match distribution {
            Distribution::Float(d) if d.log_scale => {
                ParamValue::Float(rng.random_range(d.low.ln()..=d.high.ln()).exp().clamp(d.low, d.high))
            }
            Distribution::Float(d) => ParamValue::Float(rng.random_range(d.low..=d.high)),
            Distribution::Int(d) => ParamValue::Int(rng.random_range(d.low..=d.high)),
        }
    }
}

impl Default for TpeSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for TpeSampler {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn sample(
        &self,
        name: &str,
        distribution: &Distribution,
        direction: Direction,
        history: &[CompletedTrial],
    ) -> ParamValue {
        let mut rng = self.rng.lock();

        let observed: Vec<(f64, f64)> = history
            .iter()
            .filter(|t| t.state == TrialState::Complete)
            .filter_map(|t| {
                t.params
                    .get(name)
                    .filter(|v| distribution.contains(v))
                    .map(|v| (t.rank_key(direction), v.as_f64()))
            })
            .collect();
        if observed.len() < self.n_startup_trials.max(2) {
            return Self::sample_uniform(distribution, &mut rng);
        }

        let (good, bad) = self.split(observed);
        let sampled = match distribution {
            Distribution::Float(d) => self
                .sample_tpe_float(d.low, d.high, d.log_scale, good, bad, &mut rng)
                .map(ParamValue::Float),
            Distribution::Int(d) => self
                .sample_tpe_float(d.low as f64, d.high as f64, false, good, bad, &mut rng)
                .map(|v| ParamValue::Int((v.round() as i64).clamp(d.low, d.high))),
        };
        sampled.unwrap_or_else(|| Self::sample_uniform(distribution, &mut rng))
    }
}

/// Builder for [`TpeSampler`].
#[derive(Clone, Debug)]
pub struct TpeSamplerBuilder {
    gamma: f64,
    n_startup_trials: usize,
    n_ei_candidates: usize,
    kde_bandwidth: Option<f64>,
    seed: Option<u64>,
}

impl TpeSamplerBuilder {
    /// Creates a builder with the default settings of [`TpeSampler::new`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            gamma: 0.25,
            n_startup_trials: 10,
            n_ei_candidates: 24,
            kde_bandwidth: None,
            seed: None,
        }
    }

    /// Fraction of trials treated as good, in (0, 1).
    #[must_use]
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Trials sampled uniformly before TPE starts.
    #[must_use]
    pub fn n_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    /// Candidates drawn from l(x) per sample.
    #[must_use]
    pub fn n_ei_candidates(mut self, n: usize) -> Self {
        self.n_ei_candidates = n;
        self
    }

    /// Fixed KDE bandwidth instead of Scott's rule.
    #[must_use]
    pub fn kde_bandwidth(mut self, bandwidth: f64) -> Self {
        self.kde_bandwidth = Some(bandwidth);
        self
    }

    /// Seed for reproducible sampling.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Like [`seed`](Self::seed), keeping entropy seeding for `None`.
    #[must_use]
    pub fn maybe_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Builds the sampler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGamma`] if gamma is outside (0, 1) and
    /// [`Error::InvalidBandwidth`] for a non-positive bandwidth.
    pub fn build(self) -> Result<TpeSampler> {
        if !(self.gamma > 0.0 && self.gamma < 1.0) {
            return Err(Error::InvalidGamma(self.gamma));
        }
        if let Some(bw) = self.kde_bandwidth {
            if bw <= 0.0 {
                return Err(Error::InvalidBandwidth(bw));
            }
        }
        let rng = match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        Ok(TpeSampler {
            gamma: self.gamma,
            n_startup_trials: self.n_startup_trials,
            n_ei_candidates: self.n_ei_candidates.max(1),
            kde_bandwidth: self.kde_bandwidth,
            rng: Mutex::new(rng),
        })
    }
}

impl Default for TpeSamplerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
