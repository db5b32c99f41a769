//! Core enums shared across the crate.

use serde::{Deserialize, Serialize};

/// The direction of optimization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Minimize the objective value.
    Minimize,
    /// Maximize the objective value.
    Maximize,
}

/// The state of a trial in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialState {
    /// The trial is currently running.
    Running,
    /// The trial completed, possibly with an undefined objective value.
    Complete,
    /// The trial failed with an error.
    Failed,
}

/// The state of an optimization job.
///
/// A job moves `Created -> Running -> Completed | Failed` exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    /// Constructed but not yet run.
    Created,
    /// Cross-validation is in progress.
    Running,
    /// Produced a result row.
    Completed,
    /// An error or panic escaped the job.
    Failed,
}

impl core::fmt::Display for TrialState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            TrialState::Running => "Running",
            TrialState::Complete => "Complete",
            TrialState::Failed => "Failed",
        })
    }
}

impl core::fmt::Display for JobState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            JobState::Created => "Created",
            JobState::Running => "Running",
            JobState::Completed => "Completed",
            JobState::Failed => "Failed",
        })
    }
}
