//! The [`Objective`] trait defines what gets optimized.
//!
//! Plain closures `Fn(&mut Trial) -> Result<Option<f64>, E>` implement it
//! through a blanket impl. Implement it on a struct to use the lifecycle
//! hooks, for example to stop a study after a wall-clock budget:
//!
//! ```
//! use std::ops::ControlFlow;
//! use std::time::{Duration, Instant};
//!
//! use vader_hpopt::prelude::*;
//!
//! struct Budgeted {
//!     start: Instant,
//!     budget: Duration,
//! }
//!
//! impl Objective for Budgeted {
//!     type Error = Error;
//!
//!     fn evaluate(&self, trial: &mut Trial) -> Result<Option<f64>> {
//!         let x = trial.suggest_float("x", -1.0, 1.0)?;
//!         Ok(Some(x * x))
//!     }
//!
//!     fn before_trial(&self, _study: &Study) -> ControlFlow<()> {
//!         if self.start.elapsed() > self.budget {
//!             ControlFlow::Break(())
//!         } else {
//!             ControlFlow::Continue(())
//!         }
//!     }
//! }
//!
//! let study = Study::new(Direction::Minimize);
//! let objective = Budgeted { start: Instant::now(), budget: Duration::from_secs(60) };
//! study.optimize(20, objective).unwrap();
//! assert_eq!(study.n_trials(), 20);
//! ```

use core::ops::ControlFlow;

use crate::sampler::CompletedTrial;
use crate::study::Study;
use crate::trial::Trial;

/// An objective function with lifecycle hooks.
///
/// `evaluate` returns `Ok(None)` when the objective is undefined for the
/// trial; the trial is still recorded as complete and ranks last. `Err`
/// marks the trial as failed.
///
/// The parallel optimizer additionally requires `Send + Sync + 'static`.
pub trait Objective {
    /// The error type returned by [`evaluate`](Objective::evaluate).
    type Error: ToString + 'static;

    /// Evaluates the objective for one trial.
    ///
    /// # Errors
    ///
    /// Any error; the trial is recorded as failed and the study continues.
    fn evaluate(&self, trial: &mut Trial) -> Result<Option<f64>, Self::Error>;

    /// Called before each trial is created. `Break` stops issuing trials;
    /// trials already running still finish.
    fn before_trial(&self, _study: &Study) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Called after each complete trial. `Break` stops issuing trials.
    fn after_trial(&self, _study: &Study, _trial: &CompletedTrial) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

impl<F, E> Objective for F
where
    F: Fn(&mut Trial) -> Result<Option<f64>, E>,
    E: ToString + 'static,
{
    type Error = E;

    fn evaluate(&self, trial: &mut Trial) -> Result<Option<f64>, E> {
        self(trial)
    }
}
