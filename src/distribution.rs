//! Parameter distribution types.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::param::ParamValue;

/// Distribution for floating-point parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloatDistribution {
    /// Lower bound (inclusive).
    pub low: f64,
    /// Upper bound (inclusive).
    pub high: f64,
    /// Whether to sample in log space.
    pub log_scale: bool,
}

/// Distribution for integer parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntDistribution {
    /// Lower bound (inclusive).
    pub low: i64,
    /// Upper bound (inclusive).
    pub high: i64,
}

/// Enum wrapping all parameter distribution types.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Distribution {
    /// A floating-point distribution.
    Float(FloatDistribution),
    /// An integer distribution.
    Int(IntDistribution),
}

impl Distribution {
    /// Checks the bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if `low > high` (or a bound is not
    /// finite) and [`Error::InvalidLogBounds`] if a log-scale range is not
    /// strictly positive.
    #[allow(clippy::cast_precision_loss)]
    pub fn validate(&self) -> Result<()> {
        match self {
            Distribution::Float(d) => {
                if !(d.low.is_finite() && d.high.is_finite()) || d.low > d.high {
                    return Err(Error::InvalidBounds {
                        low: d.low,
                        high: d.high,
                    });
                }
                if d.log_scale && d.low <= 0.0 {
                    return Err(Error::InvalidLogBounds);
                }
            }
            Distribution::Int(d) => {
                if d.low > d.high {
                    return Err(Error::InvalidBounds {
                        low: d.low as f64,
                        high: d.high as f64,
                    });
                }
            }
        }
        Ok(())
    }

    /// Whether `value` has this distribution's type and lies within its bounds.
    #[must_use]
    pub fn contains(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (Distribution::Float(d), ParamValue::Float(v)) => (d.low..=d.high).contains(v),
            (Distribution::Int(d), ParamValue::Int(v)) => (d.low..=d.high).contains(v),
            _ => false,
        }
    }
}
