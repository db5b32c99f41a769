#![allow(clippy::cast_precision_loss)]

mod failure;
mod optimizer;
mod regroup;

use ndarray::Array3;
use vader_hpopt::Dataset;
use vader_hpopt::sweep::{OptimizerConfig, SearchSpace};

/// Two separated groups of trajectories.
pub(crate) fn small_data(n: usize) -> Dataset {
    let data = Array3::from_shape_fn((n, 3, 2), |(i, t, f)| {
        (if i % 2 == 0 { -2.0 } else { 2.0 }) + 0.1 * (t + f) as f64 + (i % 5) as f64 / 40.0
    });
    Dataset::unweighted(data).unwrap()
}

/// A fast configuration writing under `dir`.
pub(crate) fn quick_config(dir: &std::path::Path) -> OptimizerConfig {
    OptimizerConfig::default()
        .with_output_folder(dir)
        .with_k_list(vec![2])
        .with_n_trials(1)
        .with_n_repeats(3)
        .with_n_epoch(2)
        .with_n_pre_epoch(1)
        .with_n_perm(5)
        .with_seed(Some(11))
        .with_search_space(SearchSpace {
            batch_size: (4, 8),
            n_hidden_1: (4, 8),
            ..SearchSpace::default()
        })
}
