//! Random sampler implementation.

use parking_lot::Mutex;

use crate::distribution::Distribution;
use crate::param::ParamValue;
use crate::sampler::{CompletedTrial, Sampler};
use crate::types::Direction;

/// Samples uniformly at random, ignoring the history.
///
/// Log-scale float distributions are sampled uniformly in log space. Also
/// used by the TPE sampler during its startup phase.
///
/// # Examples
///
/// ```
/// use vader_hpopt::sampler::random::RandomSampler;
///
/// let sampler = RandomSampler::new();
/// let seeded = RandomSampler::with_seed(42);
/// ```
pub struct RandomSampler {
    rng: Mutex<fastrand::Rng>,
}

impl RandomSampler {
    /// Creates a sampler seeded from entropy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Creates a sampler with a fixed seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }
}

impl Default for RandomSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Uniform draw from `distribution`.
pub(crate) fn sample_uniform(rng: &mut fastrand::Rng, distribution: &Distribution) -> ParamValue {
    match distribution {
        Distribution::Float(d) => {
            let (low, high) = if d.log_scale {
                (d.low.ln(), d.high.ln())
            } else {
                (d.low, d.high)
            };
            let value = low + rng.f64() * (high - low);
            let value = if d.log_scale { value.exp() } else { value };
            ParamValue::Float(value.clamp(d.low, d.high))
        }
        Distribution::Int(d) => ParamValue::Int(rng.i64(d.low..=d.high)),
    }
}

impl Sampler for RandomSampler {
    fn sample(
        &self,
        _name: &str,
        distribution: &Distribution,
        _direction: Direction,
        _history: &[CompletedTrial],
    ) -> ParamValue {
        sample_uniform(&mut self.rng.lock(), distribution)
    }
}
