//! Hyperparameter configuration of one model family member.

use core::fmt;
use core::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::table::{Cell, Row};

/// An immutable hyperparameter configuration.
///
/// Equality and hashing are structural: two configurations with the same
/// values are the same configuration, regardless of where they came from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HyperParams {
    /// Target number of mixture components.
    pub k: usize,
    /// Widths of the hidden layers, outermost first.
    pub n_hidden: Vec<usize>,
    /// Optimiser learning rate.
    pub learning_rate: f64,
    /// Mini-batch size.
    pub batch_size: usize,
    /// Weight of the latent loss in the total loss.
    pub alpha: f64,
}

impl HyperParams {
    /// Column names in the order [`HyperParams::to_row`] emits them.
    pub const COLUMNS: [&'static str; 5] = ["k", "n_hidden", "learning_rate", "batch_size", "alpha"];

    /// Creates a configuration.
    #[must_use]
    pub fn new(k: usize, n_hidden: Vec<usize>, learning_rate: f64, batch_size: usize, alpha: f64) -> Self {
        Self {
            k,
            n_hidden,
            learning_rate,
            batch_size,
            alpha,
        }
    }

    /// Hidden layer widths rendered as a JSON list, e.g. `[32,8]`.
    #[must_use]
    pub fn n_hidden_label(&self) -> String {
        let inner: Vec<String> = self.n_hidden.iter().map(ToString::to_string).collect();
        format!("[{}]", inner.join(","))
    }

    /// The configuration as result-row cells.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn to_row(&self) -> Row {
        Row::new()
            .with("k", Cell::Int(self.k as i64))
            .with("n_hidden", Cell::Text(self.n_hidden_label()))
            .with("learning_rate", Cell::Float(self.learning_rate))
            .with("batch_size", Cell::Int(self.batch_size as i64))
            .with("alpha", Cell::Float(self.alpha))
    }
}

impl PartialEq for HyperParams {
    fn eq(&self, other: &Self) -> bool {
        self.k == other.k
            && self.n_hidden == other.n_hidden
            && self.learning_rate.to_bits() == other.learning_rate.to_bits()
            && self.batch_size == other.batch_size
            && self.alpha.to_bits() == other.alpha.to_bits()
    }
}

impl Eq for HyperParams {}

impl Hash for HyperParams {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.k.hash(state);
        self.n_hidden.hash(state);
        self.learning_rate.to_bits().hash(state);
        self.batch_size.hash(state);
        self.alpha.to_bits().hash(state);
    }
}

impl fmt::Display for HyperParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{k: {}, n_hidden: {}, learning_rate: {}, batch_size: {}, alpha: {}}}",
            self.k,
            self.n_hidden_label(),
            self.learning_rate,
            self.batch_size,
            self.alpha
        )
    }
}
