use vader_hpopt::prelude::*;

fn objective(trial: &mut Trial) -> Result<Option<f64>> {
    let x = trial.suggest_float("x", 0.0, 1.0)?;
    Ok(Some(x))
}

#[test]
fn reopened_journal_continues_the_study() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("VaDER_k2.jsonl");

    let first = Study::with_sampler_and_storage(
        Direction::Maximize,
        RandomSampler::with_seed(1),
        JournalStorage::open(&path).unwrap(),
    );
    first.optimize(3, objective).unwrap();
    let first_best = first.best_value().unwrap();

    let second = Study::with_sampler_and_storage(
        Direction::Maximize,
        RandomSampler::with_seed(2),
        JournalStorage::open(&path).unwrap(),
    );
    assert_eq!(second.n_trials(), 3);
    second.optimize(2, objective).unwrap();

    let ids: Vec<u64> = second.trials().iter().map(|t| t.id).collect();
    assert_eq!(ids, [0, 1, 2, 3, 4]);
    assert!(second.best_value().unwrap() >= first_best);
    assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 5);
}

#[test]
fn failed_trials_are_journaled_too() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("study.jsonl");
    let study = Study::with_sampler_and_storage(
        Direction::Maximize,
        RandomSampler::with_seed(1),
        JournalStorage::open(&path).unwrap(),
    );
    study.fail_trial(study.ask(), "diverged");
    study.complete_trial(study.ask(), Some(0.1));

    let reopened = Study::with_sampler_and_storage(
        Direction::Maximize,
        RandomSampler::new(),
        JournalStorage::open(&path).unwrap(),
    );
    assert_eq!(reopened.n_trials(), 1);
    assert_eq!(reopened.n_failed_trials(), 1);
    assert_eq!(reopened.best_trial().unwrap().id, 1);
}
