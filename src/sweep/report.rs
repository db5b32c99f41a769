//! Sweep-level tables and the regrouping of trial rows by repeat.

use std::path::{Path, PathBuf};

use super::config::SearchSpace;
use crate::error::{Error, Result};
use crate::param::ParamValue;
use crate::sampler::CompletedTrial;
use crate::table::{self, Cell, RawTable, Row};

/// Outcome of the search for one candidate cluster count.
#[derive(Clone, Debug, PartialEq)]
pub struct KSummary {
    /// Candidate cluster count.
    pub k: usize,
    /// Best complete trial, if any trial completed.
    pub best: Option<CompletedTrial>,
    /// Every trial recorded for this K, including resumed ones.
    pub trials: Vec<CompletedTrial>,
    /// Complete trials.
    pub n_trials: usize,
    /// Jobs that failed during this run.
    pub n_failed_jobs: usize,
}

impl KSummary {
    /// The best objective value; `None` if undefined or nothing completed.
    #[must_use]
    pub fn best_value(&self) -> Option<f64> {
        self.best.as_ref().and_then(|t| t.value)
    }

    /// Best-scores row: `k`, `trial`, the suggested parameters, `best_value`,
    /// `n_trials`, `n_failed_jobs`.
    #[must_use]
    pub fn to_row(&self) -> Row {
        let mut row = Row::new().with("k", int(self.k));
        row.set(
            "trial",
            self.best
                .as_ref()
                .map_or(Cell::Empty, |t| Cell::Int(i64::try_from(t.id).unwrap_or(i64::MAX))),
        );
        for name in SearchSpace::PARAM_NAMES {
            let cell = match self.best.as_ref().and_then(|t| t.params.get(name)) {
                Some(ParamValue::Float(v)) => Cell::Float(*v),
                Some(ParamValue::Int(v)) => Cell::Int(*v),
                None => Cell::Empty,
            };
            row.set(name, cell);
        }
        row.set("best_value", self.best_value().map_or(Cell::Empty, Cell::Float));
        row.set("n_trials", int(self.n_trials));
        row.set("n_failed_jobs", int(self.n_failed_jobs));
        row
    }
}

fn int(value: usize) -> Cell {
    Cell::Int(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Columns of the best-scores table.
#[must_use]
pub fn best_score_columns() -> Vec<&'static str> {
    let mut columns = vec!["k", "trial"];
    columns.extend(SearchSpace::PARAM_NAMES);
    columns.extend(["best_value", "n_trials", "n_failed_jobs"]);
    columns
}

/// Writes one best-scores row per K.
///
/// # Errors
///
/// Returns an I/O or CSV error if the file cannot be written.
pub fn write_best_scores(path: &Path, summaries: &[KSummary]) -> Result<()> {
    let rows: Vec<Row> = summaries.iter().map(KSummary::to_row).collect();
    table::write_table(path, &best_score_columns(), &rows)
}

/// Writes every trial of every K: `k` followed by the trial's row.
///
/// # Errors
///
/// Returns an I/O or CSV error if the file cannot be written.
pub fn write_all_trials(path: &Path, summaries: &[KSummary]) -> Result<()> {
    let rows: Vec<Row> = summaries
        .iter()
        .flat_map(|summary| {
            summary.trials.iter().map(move |trial| {
                let mut row = Row::new().with("k", int(summary.k));
                row.extend(trial.to_row());
                row
            })
        })
        .collect();
    let header = crate::study::union_header(&rows);
    table::write_table(path, &header, &rows)
}

/// Redistributes the rows of every per-trial CSV into repeat files.
///
/// Trial files are read in file-name order and concatenated; row `i` of the
/// concatenation goes to `repeats_dir/repeat_{i mod n_repeats}.csv`. Rows are
/// copied verbatim and repeat files from an earlier, larger `n_repeats` are
/// removed. Returns the written paths; nothing is touched when there are no
/// trial files.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] if `n_repeats` is zero,
/// [`Error::InvalidData`] if trial files disagree on their header, and I/O
/// or CSV errors from reading and writing.
pub fn regroup_repeats(trials_dir: &Path, repeats_dir: &Path, n_repeats: usize) -> Result<Vec<PathBuf>> {
    if n_repeats == 0 {
        return Err(Error::InvalidConfig("n_repeats must be at least 1".into()));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(trials_dir)?
        .filter_map(core::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    files.sort();
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let mut all = RawTable::default();
    for file in &files {
        all.concat(RawTable::read(file)?)?;
    }

    std::fs::create_dir_all(repeats_dir)?;
    remove_stale_repeats(repeats_dir, n_repeats)?;
    let mut written = Vec::with_capacity(n_repeats);
    for repeat in 0..n_repeats {
        let path = repeats_dir.join(format!("repeat_{repeat}.csv"));
        all.write_subset(&path, all.records.iter().skip(repeat).step_by(n_repeats))?;
        written.push(path);
    }
    trace_debug!(n_rows = all.records.len(), n_files = files.len(), "trial rows regrouped");
    Ok(written)
}

/// Deletes `repeat_{i}.csv` files with `i >= n_repeats` left by earlier runs.
fn remove_stale_repeats(repeats_dir: &Path, n_repeats: usize) -> Result<()> {
    for entry in std::fs::read_dir(repeats_dir)? {
        let path = entry?.path();
        let index = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix("repeat_"))
            .and_then(|rest| rest.strip_suffix(".csv"))
            .and_then(|index| index.parse::<usize>().ok());
        if index.is_some_and(|i| i >= n_repeats) {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}
