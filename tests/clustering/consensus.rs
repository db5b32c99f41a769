use proptest::prelude::*;
use vader_hpopt::Error;
use vader_hpopt::clustering::{adjusted_rand_index, consensus_clustering, effective_k};

proptest! {
    #[test]
    fn identical_runs_reproduce_the_partition(
        base in prop::collection::vec(0usize..4, 2..30),
        offsets in prop::collection::vec(0usize..50, 1..5),
    ) {
        // Same partition, different raw label ids per run.
        let runs: Vec<Vec<usize>> = offsets
            .iter()
            .map(|&o| base.iter().map(|&l| (l * 7 + o) % 1000).collect())
            .collect();
        let k = effective_k(&base);
        let fused = consensus_clustering(&runs, k).unwrap();
        prop_assert_eq!(effective_k(&fused), k);
        prop_assert!((adjusted_rand_index(&fused, &base).unwrap() - 1.0).abs() < 1e-12);
    }
}

#[test]
fn majority_co_membership_wins() {
    let runs = vec![
        vec![0, 0, 0, 1, 1, 1],
        vec![0, 0, 0, 1, 1, 1],
        vec![0, 0, 1, 1, 1, 1],
    ];
    assert_eq!(consensus_clustering(&runs, 2).unwrap(), vec![0, 0, 0, 1, 1, 1]);
}

#[test]
fn deterministic_for_identical_input() {
    let runs = vec![vec![0, 1, 0, 1, 2, 2], vec![1, 1, 0, 0, 2, 2]];
    assert_eq!(
        consensus_clustering(&runs, 3).unwrap(),
        consensus_clustering(&runs, 3).unwrap()
    );
}

#[test]
fn invalid_input_is_rejected() {
    assert!(matches!(consensus_clustering(&[], 2), Err(Error::EmptyLabels)));
    assert!(matches!(
        consensus_clustering(&[vec![0, 1], vec![0]], 1),
        Err(Error::LabelLengthMismatch { .. })
    ));
    assert!(matches!(
        consensus_clustering(&[vec![0, 1]], 3),
        Err(Error::InvalidClusterCount { .. })
    ));
}
