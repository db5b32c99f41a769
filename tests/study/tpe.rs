use vader_hpopt::prelude::*;

fn peaked(trial: &mut Trial) -> Result<Option<f64>> {
    let x = trial.suggest_float("x", 0.0, 1.0)?;
    Ok(Some(-(x - 0.7).powi(2)))
}

#[test]
fn tpe_concentrates_near_the_optimum() {
    let sampler = TpeSampler::builder().seed(42).n_startup_trials(10).build().unwrap();
    let study = Study::with_sampler(Direction::Maximize, sampler);
    study.optimize(60, peaked).unwrap();

    let trials = study.trials();
    let late: Vec<f64> = trials[40..]
        .iter()
        .map(|t| (t.float("x").unwrap() - 0.7).abs())
        .collect();
    #[allow(clippy::cast_precision_loss)]
    let mean = late.iter().sum::<f64>() / late.len() as f64;
    assert!(mean < 0.2, "late trials stay spread out: {mean}");
    assert!((study.best_trial().unwrap().float("x").unwrap() - 0.7).abs() < 0.05);
}

#[test]
fn seeded_tpe_is_reproducible() {
    let run = || {
        let sampler = TpeSampler::builder().seed(3).n_startup_trials(4).build().unwrap();
        let study = Study::with_sampler(Direction::Maximize, sampler);
        study
            .optimize(15, |trial: &mut Trial| -> Result<Option<f64>> {
                let n = trial.suggest_int("n_hidden_1", 8, 128)?;
                let lr = trial.suggest_loguniform("learning_rate", 1e-4, 1e-2)?;
                #[allow(clippy::cast_precision_loss)]
                Ok(Some(lr.ln() - n as f64 / 100.0))
            })
            .unwrap();
        study
            .trials()
            .iter()
            .map(|t| (t.int("n_hidden_1").unwrap(), t.float("learning_rate").unwrap()))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn tpe_tolerates_undefined_values() {
    let sampler = TpeSampler::builder().seed(9).n_startup_trials(2).build().unwrap();
    let study = Study::with_sampler(Direction::Maximize, sampler);
    study
        .optimize(12, |trial: &mut Trial| -> Result<Option<f64>> {
            let x = trial.suggest_int("batch_size", 8, 128)?;
            Ok((x % 3 != 0).then_some(-((x - 64) as f64).abs()))
        })
        .unwrap();
    assert_eq!(study.n_trials(), 12);
}

#[test]
fn invalid_gamma_is_rejected() {
    assert!(matches!(
        TpeSampler::builder().gamma(1.5).build(),
        Err(Error::InvalidGamma(_))
    ));
}
