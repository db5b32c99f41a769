use vader_hpopt::prelude::*;
use vader_hpopt::table::RawTable;

#[test]
fn ask_and_tell_tracks_the_best_trial() {
    let study = Study::with_sampler(Direction::Maximize, RandomSampler::with_seed(5));
    for _ in 0..8 {
        let mut trial = study.ask();
        let x = trial.suggest_float("x", -1.0, 1.0).unwrap();
        study.tell(trial, Ok::<_, Error>(Some(-x * x)));
    }
    let failing = study.ask();
    study.tell(failing, Err::<Option<f64>, _>("out of memory"));

    assert_eq!(study.n_trials(), 8);
    assert_eq!(study.n_failed_trials(), 1);
    let best = study.best_trial().unwrap();
    let best_x = best.float("x").unwrap();
    for trial in study.trials().iter().filter(|t| t.state == TrialState::Complete) {
        assert!(trial.float("x").unwrap().abs() >= best_x.abs());
    }
    assert_eq!(study.best_value().unwrap(), Some(-best_x * best_x));
}

#[test]
fn undefined_values_never_win() {
    let study = Study::new(Direction::Minimize);
    study.complete_trial(study.create_trial(), None);
    study.complete_trial(study.create_trial(), Some(1e9));
    study.complete_trial(study.create_trial(), None);
    assert_eq!(study.best_trial().unwrap().id, 1);
}

#[test]
fn empty_study_has_no_best() {
    let study = Study::new(Direction::Maximize);
    assert!(matches!(study.best_trial(), Err(Error::NoCompletedTrials)));
}

#[test]
fn closures_drive_optimize() {
    let study = Study::with_sampler(Direction::Minimize, RandomSampler::with_seed(1));
    study
        .optimize(10, |trial: &mut Trial| -> Result<Option<f64>> {
            let batch = trial.suggest_int("batch_size", 8, 128)?;
            let lr = trial.suggest_loguniform("learning_rate", 1e-4, 1e-2)?;
            #[allow(clippy::cast_precision_loss)]
            Ok(Some(batch as f64 * lr))
        })
        .unwrap();
    assert_eq!(study.n_trials(), 10);
    for trial in study.trials() {
        assert!((8..=128).contains(&trial.int("batch_size").unwrap()));
        assert!((1e-4..=1e-2).contains(&trial.float("learning_rate").unwrap()));
    }
}

#[test]
fn exported_history_has_one_row_per_trial() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.csv");
    let study = Study::new(Direction::Maximize);
    let mut trial = study.ask();
    trial.suggest_int("n_hidden_1", 8, 16).unwrap();
    study.complete_trial(trial, Some(0.5));
    study.fail_trial(study.ask(), "boom");

    study.export_csv(&path).unwrap();
    let table = RawTable::read(&path).unwrap();
    assert_eq!(table.records.len(), 2);
    let state = table.header.iter().position(|h| h == "state").unwrap();
    assert_eq!(&table.records[1][state], TrialState::Failed.to_string());
}
