//! Failure containment around single optimization jobs.

use core::any::Any;
use std::fmt::Write as _;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::data::Dataset;
use crate::error::{Error, error_chain};
use crate::hyperparams::HyperParams;
use crate::job::{JobSettings, OptimizationJob};
use crate::model::ModelFactory;
use crate::table::Row;

/// What a contained job left behind.
#[derive(Debug)]
pub struct ContainedJob {
    /// The job's unique id.
    pub job_id: Uuid,
    /// Configuration plus metrics, or configuration only after a failure.
    pub row: Row,
    /// The error, if the job failed.
    pub error: Option<Error>,
    /// Where the failure log was written, if it was.
    pub log_path: Option<PathBuf>,
}

impl ContainedJob {
    /// Whether the job failed.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Runs one job, converting errors and panics into a placeholder row.
///
/// A failed job leaves `failed_jobs_dir/{job_id}.log` with its id,
/// configuration, seed and full error chain. The placeholder row holds the
/// configuration columns only, so a trial keeps one row per repeat.
pub fn run_contained<F: ModelFactory>(
    data: &Dataset,
    factory: &F,
    params: &HyperParams,
    settings: &JobSettings,
    seed: Option<u64>,
    failed_jobs_dir: &Path,
) -> ContainedJob {
    let mut job = OptimizationJob::new(data, factory, params.clone(), settings.clone(), seed);
    let job_id = job.id();
    trace_info!(job_id = %job_id, params = %params, "job started");

    let result = match catch_unwind(AssertUnwindSafe(|| job.run())) {
        Ok(result) => result,
        Err(payload) => Err(Error::JobPanicked(panic_message(payload.as_ref()))),
    };

    match result {
        Ok(row) => {
            trace_info!(job_id = %job_id, "job finished");
            ContainedJob {
                job_id,
                row,
                error: None,
                log_path: None,
            }
        }
        Err(error) => {
            let trace = error_chain(&error);
            trace_error!(job_id = %job_id, params = %params, error = %trace, "job failed");
            let log_path = failed_jobs_dir.join(format!("{job_id}.log"));
            let log_path = match std::fs::write(&log_path, failure_log(job_id, params, seed, &trace)) {
                Ok(()) => Some(log_path),
                Err(_err) => {
                    trace_error!(path = %log_path.display(), error = %_err, "cannot write failure log");
                    None
                }
            };
            ContainedJob {
                job_id,
                row: params.to_row(),
                error: Some(error),
                log_path,
            }
        }
    }
}

fn failure_log(job_id: Uuid, params: &HyperParams, seed: Option<u64>, trace: &str) -> String {
    let mut log = String::new();
    let _ = writeln!(log, "Job failed: {job_id}");
    let _ = writeln!(log, "params: {params}");
    let _ = writeln!(log, "seed: {seed:?}");
    let _ = writeln!(log, "{trace}");
    log
}

/// Best-effort text of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
