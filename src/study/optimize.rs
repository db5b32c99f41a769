use core::ops::ControlFlow;

use super::Study;
use crate::objective::Objective;
use crate::types::TrialState;

impl Study {
    /// Runs up to `n_trials` evaluations sequentially.
    ///
    /// Accepts any [`Objective`], including plain closures
    /// (`Fn(&mut Trial) -> Result<Option<f64>, E>`). An `Err` from the
    /// objective fails that trial and the loop moves on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCompletedTrials`](crate::Error::NoCompletedTrials)
    /// if no trial completed.
    ///
    /// # Examples
    ///
    /// ```
    /// use vader_hpopt::sampler::random::RandomSampler;
    /// use vader_hpopt::{Direction, Error, Study, Trial};
    ///
    /// let study = Study::with_sampler(Direction::Minimize, RandomSampler::with_seed(42));
    /// study
    ///     .optimize(10, |trial: &mut Trial| {
    ///         let x = trial.suggest_float("x", -10.0, 10.0)?;
    ///         Ok::<_, Error>(Some(x * x))
    ///     })
    ///     .unwrap();
    ///
    /// assert_eq!(study.n_trials(), 10);
    /// assert!(study.best_value().unwrap().unwrap() >= 0.0);
    /// ```
    #[allow(clippy::needless_pass_by_value)]
    pub fn optimize(&self, n_trials: usize, objective: impl Objective) -> crate::Result<()> {
        let _span = trace_span!("optimize", n_trials, direction = ?self.direction);

        for _ in 0..n_trials {
            if let ControlFlow::Break(()) = objective.before_trial(self) {
                break;
            }

            let mut trial = self.create_trial();
            match objective.evaluate(&mut trial) {
                Ok(value) => {
                    let completed = trial.into_completed(value, TrialState::Complete);
                    let flow = objective.after_trial(self, &completed);
                    trace_info!(trial_id = completed.id, value = ?completed.value, "trial completed");
                    self.storage.push(completed);
                    if let ControlFlow::Break(()) = flow {
                        break;
                    }
                }
                Err(e) => self.fail_trial(trial, e.to_string()),
            }
        }

        if self.has_complete_trial() {
            Ok(())
        } else {
            Err(crate::Error::NoCompletedTrials)
        }
    }
}
