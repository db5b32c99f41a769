use approx::assert_relative_eq;
use proptest::prelude::*;
use vader_hpopt::clustering::{
    ClusteringMetrics, adjusted_rand_index, permuted_clustering_evaluation_metrics,
    prediction_strength, rand_index,
};
use vader_hpopt::Error;

fn labels(max_len: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..5, 2..max_len)
}

fn label_pair() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    (2usize..40).prop_flat_map(|n| {
        (
            prop::collection::vec(0usize..5, n),
            prop::collection::vec(0usize..5, n),
        )
    })
}

proptest! {
    #[test]
    fn identical_labelings_agree_perfectly(a in labels(40)) {
        prop_assert!((rand_index(&a, &a).unwrap() - 1.0).abs() < 1e-12);
        prop_assert!((adjusted_rand_index(&a, &a).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn metrics_are_symmetric((a, b) in label_pair()) {
        prop_assert!((rand_index(&a, &b).unwrap() - rand_index(&b, &a).unwrap()).abs() < 1e-12);
        prop_assert!(
            (adjusted_rand_index(&a, &b).unwrap() - adjusted_rand_index(&b, &a).unwrap()).abs() < 1e-12
        );
    }

    #[test]
    fn rand_index_is_a_fraction((a, b) in label_pair()) {
        let ri = rand_index(&a, &b).unwrap();
        prop_assert!((0.0..=1.0).contains(&ri));
        let ps = prediction_strength(&a, &b).unwrap();
        prop_assert!((0.0..=1.0).contains(&ps));
    }

    #[test]
    fn relabelling_does_not_change_agreement((a, b) in label_pair()) {
        let renamed: Vec<usize> = a.iter().map(|&l| 10 + 3 * l).collect();
        prop_assert!((rand_index(&a, &b).unwrap() - rand_index(&renamed, &b).unwrap()).abs() < 1e-12);
        prop_assert!(
            (adjusted_rand_index(&a, &b).unwrap() - adjusted_rand_index(&renamed, &b).unwrap()).abs() < 1e-12
        );
    }
}

#[test]
fn permuted_null_is_below_perfect_agreement() {
    let pred: Vec<usize> = (0..90).map(|i| i % 3).collect();
    let mut rng = fastrand::Rng::with_seed(7);
    let null = permuted_clustering_evaluation_metrics(&pred, &pred, 100, &mut rng).unwrap();
    let real = ClusteringMetrics::compute(&pred, &pred).unwrap();

    assert_relative_eq!(real.rand_index, 1.0);
    assert!(null.rand_index < real.rand_index);
    assert!(null.adj_rand_index.abs() < 0.1, "chance ARI near zero, got {}", null.adj_rand_index);
    assert!(null.prediction_strength < real.prediction_strength);
}

#[test]
fn permutation_count_must_be_positive() {
    let pred = vec![0, 1, 0, 1];
    let mut rng = fastrand::Rng::with_seed(0);
    assert!(matches!(
        permuted_clustering_evaluation_metrics(&pred, &pred, 0, &mut rng),
        Err(Error::InvalidPermutationCount)
    ));
}

#[test]
fn seeded_permutations_are_reproducible() {
    let pred: Vec<usize> = (0..30).map(|i| i % 2).collect();
    let reference: Vec<usize> = (0..30).map(|i| usize::from(i < 15)).collect();
    let run = |seed| {
        let mut rng = fastrand::Rng::with_seed(seed);
        permuted_clustering_evaluation_metrics(&pred, &reference, 20, &mut rng).unwrap()
    };
    assert_eq!(run(3), run(3));
}

#[test]
fn prediction_strength_detects_split_clusters() {
    // The reference puts 0..4 together; the prediction splits it in half.
    let reference = vec![0, 0, 0, 0, 1, 1, 1, 1];
    let predicted = vec![0, 0, 1, 1, 2, 2, 2, 2];
    let ps = prediction_strength(&predicted, &reference).unwrap();
    assert_relative_eq!(ps, 1.0 / 3.0, epsilon = 1e-12);
}

#[test]
fn singleton_reference_clusters_are_ignored() {
    assert_relative_eq!(prediction_strength(&[0, 1, 2], &[0, 1, 2]).unwrap(), 1.0);
}

#[test]
fn length_mismatch_is_an_error() {
    assert!(matches!(
        rand_index(&[0, 1], &[0, 1, 1]),
        Err(Error::LabelLengthMismatch { .. })
    ));
}
