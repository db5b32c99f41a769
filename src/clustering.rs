//! Label-agreement statistics and consensus clustering.
//!
//! All routines are pure functions over label vectors (one cluster id per
//! sample). Raw label ids carry no meaning across vectors; only co-membership
//! does.

use std::collections::HashMap;

use ndarray::Array2;

use crate::error::{Error, Result};

/// The three agreement metrics reported for every clustering comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClusteringMetrics {
    /// Unadjusted Rand index in `[0, 1]`.
    pub rand_index: f64,
    /// Chance-corrected Rand index; `1.0` is perfect agreement, `~0` is chance.
    pub adj_rand_index: f64,
    /// Prediction strength in `[0, 1]`.
    pub prediction_strength: f64,
}

impl ClusteringMetrics {
    /// Computes all three metrics between `predicted` and `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LabelLengthMismatch`] if the vectors differ in length.
    pub fn compute(predicted: &[usize], reference: &[usize]) -> Result<Self> {
        let table = Contingency::new(predicted, reference)?;
        Ok(Self {
            rand_index: table.rand_index(),
            adj_rand_index: table.adjusted_rand_index(),
            prediction_strength: prediction_strength(predicted, reference)?,
        })
    }

    /// Metric names paired with their values, in reporting order.
    #[must_use]
    pub fn named(&self) -> [(&'static str, f64); 3] {
        [
            ("rand_index", self.rand_index),
            ("adj_rand_index", self.adj_rand_index),
            ("prediction_strength", self.prediction_strength),
        ]
    }
}

impl core::ops::AddAssign for ClusteringMetrics {
    fn add_assign(&mut self, rhs: Self) {
        self.rand_index += rhs.rand_index;
        self.adj_rand_index += rhs.adj_rand_index;
        self.prediction_strength += rhs.prediction_strength;
    }
}

impl core::ops::Div<f64> for ClusteringMetrics {
    type Output = Self;

    fn div(self, rhs: f64) -> Self {
        Self {
            rand_index: self.rand_index / rhs,
            adj_rand_index: self.adj_rand_index / rhs,
            prediction_strength: self.prediction_strength / rhs,
        }
    }
}

/// Pair counts of a contingency table between two labelings.
struct Contingency {
    /// Sum over cells of C(n_ij, 2).
    pairs_both: f64,
    /// Sum over rows of C(a_i, 2).
    pairs_a: f64,
    /// Sum over columns of C(b_j, 2).
    pairs_b: f64,
    /// C(n, 2).
    pairs_total: f64,
}

#[allow(clippy::cast_precision_loss)]
fn comb2(n: usize) -> f64 {
    let n = n as f64;
    n * (n - 1.0) / 2.0
}

impl Contingency {
    fn new(a: &[usize], b: &[usize]) -> Result<Self> {
        check_lengths(a, b)?;
        let mut cells: HashMap<(usize, usize), usize> = HashMap::new();
        let mut rows: HashMap<usize, usize> = HashMap::new();
        let mut cols: HashMap<usize, usize> = HashMap::new();
        for (&x, &y) in a.iter().zip(b) {
            *cells.entry((x, y)).or_insert(0) += 1;
            *rows.entry(x).or_insert(0) += 1;
            *cols.entry(y).or_insert(0) += 1;
        }
        Ok(Self {
            pairs_both: cells.values().map(|&n| comb2(n)).sum(),
            pairs_a: rows.values().map(|&n| comb2(n)).sum(),
            pairs_b: cols.values().map(|&n| comb2(n)).sum(),
            pairs_total: comb2(a.len()),
        })
    }

    fn rand_index(&self) -> f64 {
        if self.pairs_total == 0.0 {
            return 1.0;
        }
        // Agreeing pairs = pairs together in both + pairs apart in both.
        let agreements =
            self.pairs_total + 2.0 * self.pairs_both - self.pairs_a - self.pairs_b;
        agreements / self.pairs_total
    }

    fn adjusted_rand_index(&self) -> f64 {
        if self.pairs_total == 0.0 {
            return 1.0;
        }
        let expected = self.pairs_a * self.pairs_b / self.pairs_total;
        let max = 0.5 * (self.pairs_a + self.pairs_b);
        // Only identical trivial partitions (all-in-one or all-singletons) hit this.
        if (max - expected).abs() < f64::EPSILON {
            return 1.0;
        }
        (self.pairs_both - expected) / (max - expected)
    }
}

fn check_lengths(a: &[usize], b: &[usize]) -> Result<()> {
    if a.len() == b.len() {
        Ok(())
    } else {
        Err(Error::LabelLengthMismatch {
            expected: a.len(),
            got: b.len(),
        })
    }
}

/// Fraction of sample pairs on which both labelings agree.
///
/// A pair agrees when both labelings put it in the same cluster or both put
/// it in different clusters. Fewer than two samples give `1.0`.
///
/// # Errors
///
/// Returns [`Error::LabelLengthMismatch`] if the vectors differ in length.
///
/// # Examples
///
/// ```
/// use vader_hpopt::clustering::rand_index;
///
/// // Same partition, different ids.
/// assert_eq!(rand_index(&[0, 0, 1, 1], &[5, 5, 2, 2]).unwrap(), 1.0);
/// ```
pub fn rand_index(a: &[usize], b: &[usize]) -> Result<f64> {
    Ok(Contingency::new(a, b)?.rand_index())
}

/// Rand index corrected for the agreement expected by chance given both
/// labelings' cluster sizes.
///
/// # Errors
///
/// Returns [`Error::LabelLengthMismatch`] if the vectors differ in length.
pub fn adjusted_rand_index(a: &[usize], b: &[usize]) -> Result<f64> {
    Ok(Contingency::new(a, b)?.adjusted_rand_index())
}

/// Prediction strength of `predicted` with respect to `reference`.
///
/// For every reference cluster with at least two members, the fraction of
/// its member pairs that `predicted` also puts together; the minimum over
/// those clusters. Over-clustering splits some reference cluster and drives
/// this towards zero. With no reference cluster of two or more members the
/// value is `1.0`.
///
/// # Errors
///
/// Returns [`Error::LabelLengthMismatch`] if the vectors differ in length.
#[allow(clippy::cast_precision_loss)]
pub fn prediction_strength(predicted: &[usize], reference: &[usize]) -> Result<f64> {
    check_lengths(predicted, reference)?;

    // reference cluster -> (predicted label -> count)
    let mut members: HashMap<usize, HashMap<usize, usize>> = HashMap::new();
    for (&p, &r) in predicted.iter().zip(reference) {
        *members.entry(r).or_default().entry(p).or_insert(0) += 1;
    }

    let strength = members
        .values()
        .filter_map(|by_pred| {
            let size: usize = by_pred.values().sum();
            (size >= 2).then(|| {
                let together: f64 = by_pred.values().map(|&n| comb2(n)).sum();
                together / comb2(size)
            })
        })
        .fold(f64::INFINITY, f64::min);

    Ok(if strength.is_finite() { strength } else { 1.0 })
}

/// Chance baseline for [`ClusteringMetrics`].
///
/// Shuffles `predicted` `n_perm` times, each with fresh draws from `rng`, and
/// averages the metrics of every shuffled vector against `reference`.
///
/// # Errors
///
/// Returns [`Error::InvalidPermutationCount`] if `n_perm` is zero and
/// [`Error::LabelLengthMismatch`] if the vectors differ in length.
///
/// # Examples
///
/// ```
/// use vader_hpopt::clustering::permuted_clustering_evaluation_metrics;
///
/// let labels: Vec<usize> = (0..60).map(|i| i % 3).collect();
/// let mut rng = fastrand::Rng::with_seed(1);
/// let null = permuted_clustering_evaluation_metrics(&labels, &labels, 50, &mut rng).unwrap();
/// assert!(null.adj_rand_index.abs() < 0.2);
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn permuted_clustering_evaluation_metrics(
    predicted: &[usize],
    reference: &[usize],
    n_perm: usize,
    rng: &mut fastrand::Rng,
) -> Result<ClusteringMetrics> {
    if n_perm == 0 {
        return Err(Error::InvalidPermutationCount);
    }
    check_lengths(predicted, reference)?;

    let mut shuffled = predicted.to_vec();
    let mut total = ClusteringMetrics::default();
    for _ in 0..n_perm {
        rng.shuffle(&mut shuffled);
        total += ClusteringMetrics::compute(&shuffled, reference)?;
    }
    Ok(total / n_perm as f64)
}

/// Fuses repeated clusterings of the same samples into one partition.
///
/// Builds the co-occurrence matrix (entry `(i, j)` is the fraction of runs
/// that put samples `i` and `j` together) and cuts an average-linkage
/// agglomerative tree over `1 - co-occurrence` at `target_k` clusters. Ties
/// merge the lowest-indexed pair first. Output labels are numbered from zero
/// in order of first appearance.
///
/// # Errors
///
/// Returns [`Error::EmptyLabels`] if `runs` is empty,
/// [`Error::LabelLengthMismatch`] if the runs differ in length and
/// [`Error::InvalidClusterCount`] if `target_k` is zero or exceeds the
/// number of samples.
///
/// # Examples
///
/// ```
/// use vader_hpopt::clustering::consensus_clustering;
///
/// let runs = vec![vec![0, 0, 1, 1], vec![1, 1, 0, 0], vec![2, 2, 7, 7]];
/// assert_eq!(consensus_clustering(&runs, 2).unwrap(), vec![0, 0, 1, 1]);
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn consensus_clustering(runs: &[Vec<usize>], target_k: usize) -> Result<Vec<usize>> {
    let first = runs.first().ok_or(Error::EmptyLabels)?;
    let n = first.len();
    for run in runs {
        check_lengths(first, run)?;
    }
    if target_k == 0 || target_k > n {
        return Err(Error::InvalidClusterCount { k: target_k, n_samples: n });
    }

    let distance = co_occurrence(runs, n).mapv(|c| 1.0 - c);
    Ok(average_linkage(distance, target_k))
}

/// Fraction of runs in which each sample pair shares a cluster.
#[allow(clippy::cast_precision_loss)]
fn co_occurrence(runs: &[Vec<usize>], n: usize) -> Array2<f64> {
    let mut co = Array2::<f64>::zeros((n, n));
    for run in runs {
        for i in 0..n {
            for j in i..n {
                if run[i] == run[j] {
                    co[[i, j]] += 1.0;
                }
            }
        }
    }
    let r = runs.len() as f64;
    for i in 0..n {
        for j in i..n {
            let v = co[[i, j]] / r;
            co[[i, j]] = v;
            co[[j, i]] = v;
        }
    }
    co
}

/// Agglomerates singletons until `target_k` clusters remain.
///
/// Cluster distances are kept up to date with the Lance–Williams update for
/// average linkage.
#[allow(clippy::cast_precision_loss)]
fn average_linkage(mut distance: Array2<f64>, target_k: usize) -> Vec<usize> {
    let n = distance.nrows();
    // Representative index -> member sample indices; inactive slots are None.
    let mut clusters: Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();
    let mut active = n;

    while active > target_k {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..n {
            if clusters[i].is_none() {
                continue;
            }
            for j in (i + 1)..n {
                if clusters[j].is_none() {
                    continue;
                }
                let d = distance[[i, j]];
                if best.is_none_or(|(_, _, bd)| d < bd) {
                    best = Some((i, j, d));
                }
            }
        }
        let Some((i, j, _)) = best else { break };

        let merged = clusters[j].take().unwrap_or_default();
        let size_i = clusters[i].as_ref().map_or(0, Vec::len) as f64;
        let size_j = merged.len() as f64;
        for other in 0..n {
            if other == i || clusters[other].is_none() {
                continue;
            }
            let d = (size_i * distance[[i, other]] + size_j * distance[[j, other]])
                / (size_i + size_j);
            distance[[i, other]] = d;
            distance[[other, i]] = d;
        }
        if let Some(members) = clusters[i].as_mut() {
            members.extend(merged);
        }
        active -= 1;
    }

    let mut owner = vec![0usize; n];
    for (slot, members) in clusters.iter().enumerate() {
        for &m in members.iter().flatten() {
            owner[m] = slot;
        }
    }
    relabel_by_first_appearance(&owner)
}

fn relabel_by_first_appearance(labels: &[usize]) -> Vec<usize> {
    let mut ids: HashMap<usize, usize> = HashMap::new();
    labels
        .iter()
        .map(|&l| {
            let next = ids.len();
            *ids.entry(l).or_insert(next)
        })
        .collect()
}

/// Number of distinct labels in `labels`.
#[must_use]
pub fn effective_k(labels: &[usize]) -> usize {
    let mut seen: Vec<usize> = labels.to_vec();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn rand_index_counts_agreeing_pairs() {
        // Pairs: (0,1) together/together, (0,2) apart/together, (1,2) apart/together.
        let ri = rand_index(&[0, 0, 1], &[0, 0, 0]).unwrap();
        assert_relative_eq!(ri, 1.0 / 3.0);
    }

    #[test]
    fn adjusted_rand_index_matches_known_value() {
        // Reference value from the classic contingency example.
        let a = [0, 0, 1, 1];
        let b = [0, 0, 1, 2];
        assert_relative_eq!(adjusted_rand_index(&a, &b).unwrap(), 0.571_428_571_428_571_4, epsilon = 1e-12);
    }

    #[test]
    fn adjusted_rand_index_can_be_negative() {
        let a = [0, 0, 1, 1];
        let b = [0, 1, 0, 1];
        assert!(adjusted_rand_index(&a, &b).unwrap() < 0.0);
    }

    #[test]
    fn trivial_inputs_score_one() {
        assert_eq!(rand_index(&[], &[]).unwrap(), 1.0);
        assert_eq!(adjusted_rand_index(&[3], &[4]).unwrap(), 1.0);
        assert_eq!(adjusted_rand_index(&[1, 1, 1], &[0, 0, 0]).unwrap(), 1.0);
        assert_eq!(adjusted_rand_index(&[0, 1, 2], &[2, 1, 0]).unwrap(), 1.0);
    }

    #[test]
    fn length_mismatch_is_an_error() {
        assert!(matches!(
            rand_index(&[0, 1], &[0]),
            Err(Error::LabelLengthMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn prediction_strength_penalises_split_reference_cluster() {
        let reference = [0, 0, 0, 0, 1, 1];
        let predicted = [0, 0, 1, 1, 2, 2];
        // Cluster 0: 2 of 6 pairs together; cluster 1: 1 of 1.
        assert_relative_eq!(prediction_strength(&predicted, &reference).unwrap(), 1.0 / 3.0);
        assert_eq!(prediction_strength(&reference, &predicted).unwrap(), 1.0);
    }

    #[test]
    fn prediction_strength_of_singletons_is_one() {
        assert_eq!(prediction_strength(&[0, 1, 2], &[0, 1, 2]).unwrap(), 1.0);
    }

    #[test]
    fn permutation_requires_positive_count() {
        let mut rng = fastrand::Rng::with_seed(0);
        assert!(matches!(
            permuted_clustering_evaluation_metrics(&[0, 1], &[0, 1], 0, &mut rng),
            Err(Error::InvalidPermutationCount)
        ));
    }

    #[test]
    fn permutation_null_is_below_perfect_agreement() {
        let labels: Vec<usize> = (0..90).map(|i| i / 30).collect();
        let mut rng = fastrand::Rng::with_seed(11);
        let null = permuted_clustering_evaluation_metrics(&labels, &labels, 100, &mut rng).unwrap();
        assert!(null.rand_index < 1.0);
        // Three equal clusters: chance Rand index is about 5/9.
        assert!((null.rand_index - 5.0 / 9.0).abs() < 0.05);
        assert!(null.adj_rand_index.abs() < 0.05);
        assert!(null.prediction_strength < 0.6);
    }

    #[test]
    fn permutation_is_reproducible_with_seed() {
        let labels: Vec<usize> = (0..40).map(|i| i % 4).collect();
        let a = permuted_clustering_evaluation_metrics(&labels, &labels, 10, &mut fastrand::Rng::with_seed(3)).unwrap();
        let b = permuted_clustering_evaluation_metrics(&labels, &labels, 10, &mut fastrand::Rng::with_seed(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn consensus_recovers_majority_partition() {
        let runs = vec![
            vec![0, 0, 0, 1, 1, 1],
            vec![1, 1, 1, 0, 0, 0],
            vec![0, 0, 1, 1, 1, 1],
        ];
        assert_eq!(consensus_clustering(&runs, 2).unwrap(), vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn consensus_validates_inputs() {
        assert!(matches!(consensus_clustering(&[], 2), Err(Error::EmptyLabels)));
        assert!(matches!(
            consensus_clustering(&[vec![0, 1], vec![0]], 1),
            Err(Error::LabelLengthMismatch { .. })
        ));
        assert!(matches!(
            consensus_clustering(&[vec![0, 1]], 3),
            Err(Error::InvalidClusterCount { k: 3, n_samples: 2 })
        ));
        assert!(matches!(
            consensus_clustering(&[vec![0, 1]], 0),
            Err(Error::InvalidClusterCount { .. })
        ));
    }

    #[test]
    fn consensus_with_one_cluster_merges_everything() {
        let runs = vec![vec![0, 1, 2, 3]];
        assert_eq!(consensus_clustering(&runs, 1).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn effective_k_counts_distinct_labels() {
        assert_eq!(effective_k(&[4, 4, 1, 4]), 2);
        assert_eq!(effective_k(&[]), 0);
    }
}
