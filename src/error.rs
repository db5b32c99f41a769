#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the data tensor and the weight mask differ in shape.
    #[error("shape mismatch: data has shape {data:?} but weights have shape {weights:?}")]
    ShapeMismatch {
        /// Shape of the data tensor.
        data: Vec<usize>,
        /// Shape of the weight mask.
        weights: Vec<usize>,
    },

    /// Returned when a dataset has no samples, time steps or features.
    #[error("dataset is empty")]
    EmptyDataset,

    /// Returned when the weight mask contains values other than 0 and 1.
    #[error("invalid weight mask: value {0} is neither 0 nor 1")]
    InvalidWeights(f64),

    /// Returned when an input file cannot be interpreted as a dataset.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Returned when a cross-validation split cannot be produced.
    #[error("invalid split: cannot split {n_samples} samples into {n_splits} folds")]
    InvalidSplit {
        /// Number of requested folds.
        n_splits: usize,
        /// Number of available samples.
        n_samples: usize,
    },

    /// Returned when a permutation baseline is requested with no permutations.
    #[error("invalid permutation count: n_perm must be positive")]
    InvalidPermutationCount,

    /// Returned when two label vectors that must align differ in length.
    #[error("label length mismatch: expected {expected} labels, got {got}")]
    LabelLengthMismatch {
        /// The expected number of labels.
        expected: usize,
        /// The actual number of labels.
        got: usize,
    },

    /// Returned when consensus clustering receives no label vectors.
    #[error("consensus clustering requires at least one label vector")]
    EmptyLabels,

    /// Returned when a requested cluster count cannot be realised.
    #[error("invalid cluster count: {k} clusters requested for {n_samples} samples")]
    InvalidClusterCount {
        /// The requested number of clusters.
        k: usize,
        /// The number of samples available.
        n_samples: usize,
    },

    /// Returned when the lower bound is greater than the upper bound.
    #[error("invalid bounds: low ({low}) must be less than or equal to high ({high})")]
    InvalidBounds {
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when log scale is used with non-positive bounds.
    #[error("invalid log bounds: low must be positive for log scale")]
    InvalidLogBounds,

    /// Returned when a parameter is suggested with a different configuration.
    #[error("parameter conflict for '{name}': {reason}")]
    ParameterConflict {
        /// The name of the conflicting parameter.
        name: String,
        /// The reason for the conflict.
        reason: String,
    },

    /// Returned when requesting the best trial but no trials have completed.
    #[error("no completed trials available")]
    NoCompletedTrials,

    /// Returned when gamma is not in the valid range (0.0, 1.0).
    #[error("invalid gamma: {0} must be in (0.0, 1.0)")]
    InvalidGamma(f64),

    /// Returned when bandwidth is not positive.
    #[error("invalid bandwidth: {0} must be positive")]
    InvalidBandwidth(f64),

    /// Returned when KDE is created with empty samples.
    #[error("KDE requires at least one sample")]
    EmptySamples,

    /// Returned by a model implementation when fitting or inference fails.
    #[error("model error: {0}")]
    Model(String),

    /// Returned when an optimization job panicked.
    #[error("job panicked: {0}")]
    JobPanicked(String),

    /// Returned when a configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Returned when a file could not be read or written.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when a CSV file could not be read or written.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Returned when a storage operation fails.
    #[error("storage error: {0}")]
    Storage(String),

    /// Returned when an async task fails.
    #[error("async task error: {0}")]
    TaskError(String),
}

pub type Result<T> = core::result::Result<T, Error>;

/// Render an error and its whole `source()` chain, one cause per line.
pub(crate) fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str("\ncaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_includes_io_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.csv");
        let err = Error::from(csv::Error::from(io));
        let rendered = error_chain(&err);
        assert!(rendered.starts_with("csv error"));
        assert!(rendered.contains("missing.csv"));
    }
}
