//! The per-trial objective of a sweep.

use core::ops::ControlFlow;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::config::OptimizerConfig;
use super::failure::run_contained;
use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::hyperparams::HyperParams;
use crate::job::{METRIC_COLUMNS, SCORE_COLUMN};
use crate::model::ModelFactory;
use crate::objective::Objective;
use crate::seed::derive_optional_seed;
use crate::study::Study;
use crate::table::{self, Cell, Row};
use crate::trial::Trial;

/// Columns of a per-trial CSV file.
#[must_use]
pub fn trial_columns() -> Vec<&'static str> {
    let mut columns = vec!["job_id", "repeat"];
    columns.extend(HyperParams::COLUMNS);
    columns.extend(METRIC_COLUMNS);
    columns
}

/// Mean of the score column over the rows that have it.
///
/// `None` when no row has a score, for example because every repeat failed.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn trial_score(rows: &[Row]) -> Option<f64> {
    let scores: Vec<f64> = rows
        .iter()
        .filter_map(|row| row.get_f64(SCORE_COLUMN))
        .filter(|v| !v.is_nan())
        .collect();
    if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}

/// Evaluates one suggested configuration for a fixed cluster count.
///
/// Each trial runs `n_repeats` contained jobs with seeds
/// `derive(seed, [k, trial, repeat])` and appends every repeat's row to its
/// own per-trial CSV file as soon as the job ends. New trials stop once the
/// per-K timeout has elapsed.
pub(crate) struct TrialObjective<F> {
    pub(crate) k: usize,
    pub(crate) data: Arc<Dataset>,
    pub(crate) factory: Arc<F>,
    pub(crate) config: Arc<OptimizerConfig>,
    pub(crate) started: Instant,
    pub(crate) failed_jobs: Arc<AtomicUsize>,
}

impl<F: ModelFactory> TrialObjective<F> {
    fn run_repeats(&self, trial_id: u64, params: &HyperParams) -> Result<Vec<Row>> {
        let settings = self.config.job_settings();
        let failed_dir = self.config.failed_jobs_dir();
        let path = self.config.trial_path(self.k, trial_id);
        let columns = trial_columns();

        let mut rows = Vec::with_capacity(self.config.n_repeats);
        for repeat in 0..self.config.n_repeats {
            let seed = derive_optional_seed(self.config.seed, &[self.k as u64, trial_id, repeat as u64]);
            let job = run_contained(&self.data, self.factory.as_ref(), params, &settings, seed, &failed_dir);
            if job.failed() {
                self.failed_jobs.fetch_add(1, Ordering::Relaxed);
            }

            let mut row = Row::new()
                .with("job_id", Cell::Text(job.job_id.to_string()))
                .with("repeat", Cell::Int(i64::try_from(repeat).unwrap_or(i64::MAX)));
            row.extend(job.row);
            table::append_rows(&path, &columns, core::slice::from_ref(&row))?;
            rows.push(row);
        }
        Ok(rows)
    }
}

impl<F: ModelFactory> Objective for TrialObjective<F> {
    type Error = Error;

    fn evaluate(&self, trial: &mut Trial) -> Result<Option<f64>> {
        let _span = trace_span!("trial", k = self.k, number = trial.id());
        let params = self.config.search_space.suggest(trial, self.k)?;
        let rows = self.run_repeats(trial.id(), &params)?;
        let score = trial_score(&rows);
        trace_info!(params = %params, score = ?score, "trial finished");
        Ok(score)
    }

    fn before_trial(&self, _study: &Study) -> ControlFlow<()> {
        if self.started.elapsed() >= self.config.timeout() {
            trace_warn!(k = self.k, "timeout reached, no new trials");
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn score_skips_placeholder_rows() {
        let rows = vec![
            Row::new().with(SCORE_COLUMN, Cell::Float(0.2)),
            Row::new().with("k", Cell::Int(2)),
            Row::new().with(SCORE_COLUMN, Cell::Float(0.4)),
        ];
        assert_relative_eq!(trial_score(&rows).unwrap(), 0.3);
    }

    #[test]
    fn all_placeholders_is_undefined() {
        let rows = vec![Row::new().with("k", Cell::Int(2)); 3];
        assert_eq!(trial_score(&rows), None);
    }

    #[test]
    fn trial_file_schema() {
        let columns = trial_columns();
        assert_eq!(&columns[..3], ["job_id", "repeat", "k"]);
        assert_eq!(columns.last(), Some(&SCORE_COLUMN));
        assert_eq!(columns.len(), 2 + HyperParams::COLUMNS.len() + METRIC_COLUMNS.len());
    }
}
