//! Trial implementation for tracking sampled parameters and trial state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::distribution::{Distribution, FloatDistribution, IntDistribution};
use crate::error::{Error, Result};
use crate::param::ParamValue;
use crate::sampler::random::RandomSampler;
use crate::sampler::{CompletedTrial, Sampler};
use crate::types::{Direction, TrialState};

/// A single evaluation of the objective.
///
/// Parameters are suggested by name. Suggesting the same name twice with
/// the same distribution returns the cached value; a different distribution
/// is a [`Error::ParameterConflict`].
///
/// Trials created by a [`Study`](crate::study::Study) sample through the
/// study's sampler with access to its history; a bare [`Trial::new`] falls
/// back to uniform random sampling.
#[derive(Clone)]
pub struct Trial {
    id: u64,
    state: TrialState,
    params: HashMap<String, ParamValue>,
    distributions: HashMap<String, Distribution>,
    direction: Direction,
    sampler: Option<Arc<dyn Sampler>>,
    history: Option<Arc<RwLock<Vec<CompletedTrial>>>>,
}

impl core::fmt::Debug for Trial {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Trial")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("params", &self.params)
            .field("distributions", &self.distributions)
            .field("has_sampler", &self.sampler.is_some())
            .finish_non_exhaustive()
    }
}

impl Trial {
    /// Creates a standalone trial that samples uniformly.
    ///
    /// # Examples
    ///
    /// ```
    /// use vader_hpopt::study::Trial;
    ///
    /// let mut trial = Trial::new(0);
    /// let lr = trial.suggest_loguniform("learning_rate", 1e-4, 1e-2).unwrap();
    /// assert!((1e-4..=1e-2).contains(&lr));
    /// assert_eq!(trial.suggest_loguniform("learning_rate", 1e-4, 1e-2).unwrap(), lr);
    /// ```
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: TrialState::Running,
            params: HashMap::new(),
            distributions: HashMap::new(),
            direction: Direction::Minimize,
            sampler: None,
            history: None,
        }
    }

    pub(crate) fn with_sampler(
        id: u64,
        direction: Direction,
        sampler: Arc<dyn Sampler>,
        history: Arc<RwLock<Vec<CompletedTrial>>>,
    ) -> Self {
        Self {
            direction,
            sampler: Some(sampler),
            history: Some(history),
            ..Self::new(id)
        }
    }

    /// The trial's unique id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TrialState {
        self.state
    }

    /// Sampled parameters by name.
    #[must_use]
    pub fn params(&self) -> &HashMap<String, ParamValue> {
        &self.params
    }

    /// Parameter distributions by name.
    #[must_use]
    pub fn distributions(&self) -> &HashMap<String, Distribution> {
        &self.distributions
    }

    /// Suggests a float uniformly distributed in `[low, high]`.
    ///
    /// # Errors
    ///
    /// Returns a bounds error for an invalid range and
    /// [`Error::ParameterConflict`] if `name` was suggested differently.
    pub fn suggest_float(&mut self, name: &str, low: f64, high: f64) -> Result<f64> {
        let dist = Distribution::Float(FloatDistribution {
            low,
            high,
            log_scale: false,
        });
        self.suggest(name, dist).map(|v| v.as_f64())
    }

    /// Suggests a float log-uniformly distributed in `[low, high]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLogBounds`] unless `0 < low`, plus the errors
    /// of [`suggest_float`](Self::suggest_float).
    pub fn suggest_loguniform(&mut self, name: &str, low: f64, high: f64) -> Result<f64> {
        let dist = Distribution::Float(FloatDistribution {
            low,
            high,
            log_scale: true,
        });
        self.suggest(name, dist).map(|v| v.as_f64())
    }

    /// Suggests an integer in `[low, high]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if `low > high` and
    /// [`Error::ParameterConflict`] if `name` was suggested differently.
    pub fn suggest_int(&mut self, name: &str, low: i64, high: i64) -> Result<i64> {
        match self.suggest(name, Distribution::Int(IntDistribution { low, high }))? {
            ParamValue::Int(v) => Ok(v),
            ParamValue::Float(_) => Err(Error::ParameterConflict {
                name: name.to_string(),
                reason: "sampler returned a float for an integer parameter".to_string(),
            }),
        }
    }

    fn suggest(&mut self, name: &str, distribution: Distribution) -> Result<ParamValue> {
        distribution.validate()?;

        if let Some(existing) = self.distributions.get(name) {
            if *existing == distribution {
                if let Some(value) = self.params.get(name) {
                    return Ok(*value);
                }
            }
            return Err(Error::ParameterConflict {
                name: name.to_string(),
                reason: "parameter was previously sampled with a different distribution"
                    .to_string(),
            });
        }

        let value = self.sample_value(name, &distribution);
        self.distributions.insert(name.to_string(), distribution);
        self.params.insert(name.to_string(), value);
        Ok(value)
    }

    fn sample_value(&self, name: &str, distribution: &Distribution) -> ParamValue {
        if let (Some(sampler), Some(history)) = (&self.sampler, &self.history) {
            let history = history.read();
            sampler.sample(name, distribution, self.direction, &history)
        } else {
            RandomSampler::new().sample(name, distribution, self.direction, &[])
        }
    }

    /// Converts the trial into its finished record.
    pub(crate) fn into_completed(self, value: Option<f64>, state: TrialState) -> CompletedTrial {
        CompletedTrial {
            id: self.id,
            params: self.params,
            distributions: self.distributions,
            value,
            state,
        }
    }
}
