//! K-fold cross-validation splitter.

use crate::error::{Error, Result};
use crate::seed::rng_from;

/// One train/validation partition of sample indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoldSplit {
    /// Indices used to fit the model.
    pub train: Vec<usize>,
    /// Held-out indices.
    pub val: Vec<usize>,
}

/// Shuffled K-fold splitter.
///
/// Indices are shuffled once (seeded, or from fresh entropy when no seed is
/// given) and cut into `n_splits` contiguous validation blocks; the first
/// `n_samples % n_splits` blocks get one extra index. Across the folds of one
/// split every index is validated exactly once.
///
/// # Examples
///
/// ```
/// use vader_hpopt::cv::KFold;
///
/// let folds = KFold::new(5).with_seed(Some(0)).split(100).unwrap();
/// assert_eq!(folds.len(), 5);
/// assert!(folds.iter().all(|f| f.val.len() == 20 && f.train.len() == 80));
/// ```
#[derive(Clone, Debug)]
pub struct KFold {
    n_splits: usize,
    seed: Option<u64>,
}

impl KFold {
    /// Creates a splitter with `n_splits` folds and no fixed seed.
    #[must_use]
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits, seed: None }
    }

    /// Sets the shuffle seed.
    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Number of folds.
    #[must_use]
    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Partitions `0..n_samples` into folds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSplit`] if `n_splits < 2` or there are fewer
    /// samples than folds (some validation set would be empty).
    pub fn split(&self, n_samples: usize) -> Result<Vec<FoldSplit>> {
        if self.n_splits < 2 || n_samples < self.n_splits {
            return Err(Error::InvalidSplit {
                n_splits: self.n_splits,
                n_samples,
            });
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        rng_from(self.seed).shuffle(&mut indices);

        let fold_size = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;
        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for i in 0..self.n_splits {
            let end = start + fold_size + usize::from(i < remainder);
            let val = indices[start..end].to_vec();
            let train = indices[..start]
                .iter()
                .chain(&indices[end..])
                .copied()
                .collect();
            folds.push(FoldSplit { train, val });
            start = end;
        }
        Ok(folds)
    }
}
