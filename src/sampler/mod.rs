//! Sampler trait and implementations for parameter sampling.

pub mod random;
pub mod tpe;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::distribution::Distribution;
use crate::param::ParamValue;
use crate::table::{Cell, Row};
use crate::types::{Direction, TrialState};

/// A finished trial with its parameters, distributions and objective value.
///
/// `value` is `None` when the objective was undefined for this trial (for
/// example because every evaluation inside it failed). Such trials still
/// count as complete but always rank below trials with a value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletedTrial {
    /// The unique identifier for this trial.
    pub id: u64,
    /// The sampled parameter values, keyed by name.
    pub params: HashMap<String, ParamValue>,
    /// The parameter distributions used, keyed by name.
    pub distributions: HashMap<String, Distribution>,
    /// The objective value, if defined.
    pub value: Option<f64>,
    /// Complete or failed.
    pub state: TrialState,
}

impl CompletedTrial {
    /// Creates a complete trial.
    #[must_use]
    pub fn new(
        id: u64,
        params: HashMap<String, ParamValue>,
        distributions: HashMap<String, Distribution>,
        value: Option<f64>,
    ) -> Self {
        Self {
            id,
            params,
            distributions,
            value,
            state: TrialState::Complete,
        }
    }

    /// Looks up a float parameter.
    #[must_use]
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.params.get(name)? {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(_) => None,
        }
    }

    /// Looks up an integer parameter.
    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.params.get(name)? {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(_) => None,
        }
    }

    /// Sort key: lower is better; undefined values sort last.
    pub(crate) fn rank_key(&self, direction: Direction) -> f64 {
        match (self.state, self.value) {
            (TrialState::Complete, Some(v)) if !v.is_nan() => match direction {
                Direction::Minimize => v,
                Direction::Maximize => -v,
            },
            _ => f64::INFINITY,
        }
    }

    /// The trial as a row: `trial`, `state`, `value`, then parameters by name.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn to_row(&self) -> Row {
        let mut row = Row::new()
            .with("trial", Cell::Int(self.id as i64))
            .with("state", Cell::Text(self.state.to_string()))
            .with("value", self.value.map_or(Cell::Empty, Cell::Float));
        let mut names: Vec<&String> = self.params.keys().collect();
        names.sort();
        for name in names {
            let cell = match self.params[name] {
                ParamValue::Float(v) => Cell::Float(v),
                ParamValue::Int(v) => Cell::Int(v),
            };
            row.set(name.clone(), cell);
        }
        row
    }
}

/// Trait for pluggable parameter sampling strategies.
///
/// Samplers see the parameter name, its distribution, the study direction
/// and every finished trial so far. The trait requires `Send + Sync` so
/// that parallel optimization can share one sampler.
pub trait Sampler: Send + Sync {
    /// Samples a value for parameter `name`.
    fn sample(
        &self,
        name: &str,
        distribution: &Distribution,
        direction: Direction,
        history: &[CompletedTrial],
    ) -> ParamValue;
}
