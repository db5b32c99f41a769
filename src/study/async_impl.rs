use core::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::Study;
use crate::objective::Objective;
use crate::trial::Trial;
use crate::types::TrialState;

type Evaluated<E> = (Trial, Result<Option<f64>, E>);

impl Study {
    /// Runs up to `n_trials` evaluations with at most `concurrency` in flight.
    ///
    /// Each evaluation runs on tokio's blocking pool via
    /// [`JoinSet::spawn_blocking`]. Results are recorded as they arrive, so
    /// trials suggested later see every result recorded so far. A `Break`
    /// from either hook stops new trials while in-flight ones drain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) if
    /// `concurrency` is zero, [`Error::TaskError`](crate::Error::TaskError) if
    /// an evaluation task panics and
    /// [`Error::NoCompletedTrials`](crate::Error::NoCompletedTrials) if no
    /// trial completed.
    ///
    /// # Examples
    ///
    /// ```
    /// use vader_hpopt::sampler::random::RandomSampler;
    /// use vader_hpopt::{Direction, Error, Study, Trial};
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let study = Study::with_sampler(Direction::Minimize, RandomSampler::with_seed(42));
    /// study
    ///     .optimize_parallel(8, 4, |trial: &mut Trial| {
    ///         let x = trial.suggest_float("x", -10.0, 10.0)?;
    ///         Ok::<_, Error>(Some(x * x))
    ///     })
    ///     .await
    ///     .unwrap();
    /// assert_eq!(study.n_trials(), 8);
    /// # });
    /// ```
    pub async fn optimize_parallel<O>(
        &self,
        n_trials: usize,
        concurrency: usize,
        objective: O,
    ) -> crate::Result<()>
    where
        O: Objective + Send + Sync + 'static,
        O::Error: Send,
    {
        if concurrency == 0 {
            return Err(crate::Error::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }

        // No entered span here: it would make the future `!Send`.
        trace_debug!(n_trials, concurrency, direction = ?self.direction, "parallel optimization started");

        let objective = Arc::new(objective);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut join_set: JoinSet<Evaluated<O::Error>> = JoinSet::new();
        let mut spawned = 0;
        let mut stopped = false;

        while spawned < n_trials && !stopped {
            if let ControlFlow::Break(()) = objective.before_trial(self) {
                break;
            }

            // Drain finished trials until a slot frees up.
            while join_set.len() >= concurrency {
                let Some(joined) = join_set.join_next().await else {
                    break;
                };
                let evaluated = joined.map_err(|e| crate::Error::TaskError(e.to_string()))?;
                if let ControlFlow::Break(()) = self.record(objective.as_ref(), evaluated) {
                    stopped = true;
                }
            }
            if stopped {
                break;
            }

            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| crate::Error::TaskError(e.to_string()))?;
            let mut trial = self.create_trial();
            let obj = Arc::clone(&objective);
            join_set.spawn_blocking(move || {
                let result = obj.evaluate(&mut trial);
                drop(permit);
                (trial, result)
            });
            spawned += 1;
        }

        while let Some(joined) = join_set.join_next().await {
            let evaluated = joined.map_err(|e| crate::Error::TaskError(e.to_string()))?;
            // Draining: hooks still run but can no longer stop anything.
            let _ = self.record(objective.as_ref(), evaluated);
        }

        if self.has_complete_trial() {
            Ok(())
        } else {
            Err(crate::Error::NoCompletedTrials)
        }
    }

    fn record<O: Objective>(&self, objective: &O, evaluated: Evaluated<O::Error>) -> ControlFlow<()> {
        match evaluated {
            (trial, Ok(value)) => {
                let completed = trial.into_completed(value, TrialState::Complete);
                let flow = objective.after_trial(self, &completed);
                trace_info!(trial_id = completed.id, value = ?completed.value, "trial completed");
                self.storage.push(completed);
                flow
            }
            (trial, Err(e)) => {
                self.fail_trial(trial, e.to_string());
                ControlFlow::Continue(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use core::ops::ControlFlow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::{Direction, Error, Objective, Study, Trial};

    #[tokio::test]
    async fn zero_concurrency_is_rejected() {
        let study = Study::new(Direction::Minimize);
        let result = study
            .optimize_parallel(1, 0, |_: &mut Trial| Ok::<_, Error>(Some(0.0)))
            .await;
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn runs_every_trial() {
        let study = Study::new(Direction::Maximize);
        study
            .optimize_parallel(12, 3, |trial: &mut Trial| {
                let x = trial.suggest_float("x", 0.0, 1.0)?;
                Ok::<_, Error>(Some(x))
            })
            .await
            .unwrap();
        assert_eq!(study.n_trials(), 12);
        let mut ids: Vec<u64> = study.trials().iter().map(|t| t.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..12).collect::<Vec<_>>());
    }

    struct Limited {
        started: AtomicUsize,
        limit: usize,
    }

    impl Objective for Limited {
        type Error = Error;

        fn evaluate(&self, _trial: &mut Trial) -> crate::Result<Option<f64>> {
            Ok(Some(1.0))
        }

        fn before_trial(&self, _study: &Study) -> ControlFlow<()> {
            if self.started.fetch_add(1, Ordering::SeqCst) >= self.limit {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }
    }

    #[tokio::test]
    async fn before_trial_limits_spawning() {
        let study = Study::new(Direction::Minimize);
        let objective = Limited {
            started: AtomicUsize::new(0),
            limit: 5,
        };
        study.optimize_parallel(100, 2, objective).await.unwrap();
        assert_eq!(study.n_trials(), 5);
    }
}
