use std::sync::atomic::{AtomicUsize, Ordering};

use vader_hpopt::model::{MixtureModel, MixtureModelFactory, ModelFactory, ModelSpec};
use vader_hpopt::sweep::BayesianOptimizer;
use vader_hpopt::table::RawTable;
use vader_hpopt::{Dataset, Error, Result};

use super::{quick_config, small_data};

/// Delegates to the reference model but breaks on one chosen `build` call.
struct FailOnCall {
    calls: AtomicUsize,
    fail_on: usize,
    panic: bool,
}

impl FailOnCall {
    fn new(fail_on: usize, panic: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on,
            panic,
        }
    }
}

impl ModelFactory for FailOnCall {
    type Model = MixtureModel;

    fn build(&self, data: &Dataset, spec: &ModelSpec) -> Result<MixtureModel> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == self.fail_on {
            if self.panic {
                panic!("injected panic");
            }
            return Err(Error::Model("injected failure".into()));
        }
        MixtureModelFactory.build(data, spec)
    }
}

fn assert_contained(factory: FailOnCall) {
    let dir = tempfile::tempdir().unwrap();
    let config = quick_config(dir.path());
    let trial_file = config.trial_path(2, 0);
    let failed_dir = config.failed_jobs_dir();

    let summary = BayesianOptimizer::new(config, factory)
        .unwrap()
        .run_blocking(small_data(20))
        .unwrap();

    assert_eq!(summary.n_failed_jobs, 1);
    let table = RawTable::read(&trial_file).unwrap();
    assert_eq!(table.records.len(), 3, "two real rows and one placeholder");

    let score_index = table
        .header
        .iter()
        .position(|h| h == "prediction_strength_diff")
        .unwrap();
    let placeholders = table
        .records
        .iter()
        .filter(|r| r.get(score_index) == Some(""))
        .count();
    assert_eq!(placeholders, 1);

    let logs: Vec<_> = std::fs::read_dir(&failed_dir).unwrap().collect();
    assert_eq!(logs.len(), 1);
    let log_path = logs[0].as_ref().unwrap().path();
    let job_id = log_path.file_stem().unwrap().to_string_lossy().to_string();
    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("injected"));
    assert!(table.records.iter().any(|r| r.get(0) == Some(job_id.as_str())));

    // The trial is still scored from the two healthy repeats.
    assert!(summary.per_k[0].best_value().is_some());
}

#[test]
fn returned_error_in_one_repeat_is_contained() {
    assert_contained(FailOnCall::new(0, false));
}

#[test]
fn panic_in_one_repeat_is_contained() {
    assert_contained(FailOnCall::new(0, true));
}

#[test]
fn every_repeat_failing_gives_an_undefined_score() {
    let dir = tempfile::tempdir().unwrap();
    let config = quick_config(dir.path());
    struct AlwaysFails;
    impl ModelFactory for AlwaysFails {
        type Model = MixtureModel;
        fn build(&self, _data: &Dataset, _spec: &ModelSpec) -> Result<MixtureModel> {
            Err(Error::Model("no accelerator".into()))
        }
    }
    let trial_file = config.trial_path(2, 0);

    let summary = BayesianOptimizer::new(config, AlwaysFails)
        .unwrap()
        .run_blocking(small_data(20))
        .unwrap();

    assert_eq!(summary.n_failed_jobs, 3);
    assert_eq!(summary.per_k[0].n_trials, 1);
    assert_eq!(summary.per_k[0].best_value(), None);
    assert_eq!(RawTable::read(&trial_file).unwrap().records.len(), 3);

    let best = RawTable::read(&summary.best_scores_path).unwrap();
    assert_eq!(best.records.len(), 1);
    let value_index = best.header.iter().position(|h| h == "best_value").unwrap();
    assert_eq!(best.records[0].get(value_index), Some(""));
}
