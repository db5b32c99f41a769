use std::time::Duration;

use vader_hpopt::model::MixtureModelFactory;
use vader_hpopt::sweep::{BayesianOptimizer, SamplerKind, best_score_columns, trial_columns};
use vader_hpopt::table::RawTable;

use super::{quick_config, small_data};

#[test]
fn sweep_writes_every_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = quick_config(dir.path())
        .with_k_list(vec![2, 3])
        .with_n_trials(3)
        .with_n_repeats(2)
        .with_n_proc(2);
    let trials_dir = config.trials_dir();

    let summary = BayesianOptimizer::new(config, MixtureModelFactory)
        .unwrap()
        .run_blocking(small_data(24))
        .unwrap();

    assert_eq!(summary.run_id, "n_trials3_n_repeats2_n_splits2_n_consensus1_n_epoch2_n_perm5_seed11");
    assert_eq!(summary.n_failed_jobs, 0);
    assert_eq!(summary.per_k.iter().map(|s| s.k).collect::<Vec<_>>(), [2, 3]);
    for per_k in &summary.per_k {
        assert_eq!(per_k.n_trials, 3);
        assert!(per_k.best_value().is_some());
        let best = per_k.best.as_ref().unwrap();
        assert!(per_k.trials.iter().all(|t| t.value <= best.value));
    }

    let best = RawTable::read(&summary.best_scores_path).unwrap();
    assert_eq!(best.header.iter().collect::<Vec<_>>(), best_score_columns());
    assert_eq!(best.records.len(), 2);

    let all = RawTable::read(&summary.all_trials_path).unwrap();
    assert_eq!(all.records.len(), 6);

    let mut names: Vec<String> = std::fs::read_dir(&trials_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        [
            "k2_trial0.csv",
            "k2_trial1.csv",
            "k2_trial2.csv",
            "k3_trial0.csv",
            "k3_trial1.csv",
            "k3_trial2.csv"
        ]
    );
    let trial = RawTable::read(&trials_dir.join("k3_trial1.csv")).unwrap();
    assert_eq!(trial.header.iter().collect::<Vec<_>>(), trial_columns());
    assert_eq!(trial.records.len(), 2);

    assert_eq!(summary.repeat_files.len(), 2);
    for file in &summary.repeat_files {
        assert_eq!(RawTable::read(file).unwrap().records.len(), 6);
    }
}

#[test]
fn resumed_sweep_continues_trial_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let config = quick_config(dir.path())
        .with_n_trials(2)
        .with_n_repeats(1)
        .with_sampler(SamplerKind::Random)
        .with_resume(true);

    let first = BayesianOptimizer::new(config.clone(), MixtureModelFactory)
        .unwrap()
        .run_blocking(small_data(20))
        .unwrap();
    assert_eq!(first.per_k[0].n_trials, 2);

    let second = BayesianOptimizer::new(config.clone(), MixtureModelFactory)
        .unwrap()
        .run_blocking(small_data(20))
        .unwrap();
    assert_eq!(second.per_k[0].n_trials, 4);
    let ids: Vec<u64> = second.per_k[0].trials.iter().map(|t| t.id).collect();
    assert_eq!(ids, [0, 1, 2, 3]);
    assert!(config.trial_path(2, 3).exists());
    assert!(config.study_path(2).exists());
}

#[test]
fn elapsed_timeout_runs_no_trials() {
    let dir = tempfile::tempdir().unwrap();
    let config = quick_config(dir.path()).with_timeout(Duration::ZERO);

    let summary = BayesianOptimizer::new(config, MixtureModelFactory)
        .unwrap()
        .run_blocking(small_data(20))
        .unwrap();

    assert_eq!(summary.per_k[0].n_trials, 0);
    assert!(summary.per_k[0].best.is_none());
    assert!(summary.repeat_files.is_empty());
    let best = RawTable::read(&summary.best_scores_path).unwrap();
    assert_eq!(best.records.len(), 1);
}

#[test]
fn too_few_samples_for_the_folds_is_rejected_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let config = quick_config(dir.path()).with_n_splits(5);
    let result = BayesianOptimizer::new(config.clone(), MixtureModelFactory)
        .unwrap()
        .run_blocking(small_data(3));
    assert!(result.is_err());
    assert!(!config.trials_dir().exists());
}

#[test]
fn repeated_cluster_counts_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = quick_config(dir.path()).with_k_list(vec![2, 3, 2]);
    assert!(matches!(
        BayesianOptimizer::new(config, MixtureModelFactory),
        Err(vader_hpopt::Error::InvalidConfig(_))
    ));
}

#[test]
fn zero_epochs_is_rejected_before_any_job() {
    let dir = tempfile::tempdir().unwrap();
    let config = quick_config(dir.path()).with_n_epoch(0);
    let failed_dir = config.failed_jobs_dir();
    assert!(matches!(
        BayesianOptimizer::new(config, MixtureModelFactory),
        Err(vader_hpopt::Error::InvalidConfig(_))
    ));
    assert!(!failed_dir.exists());
}
