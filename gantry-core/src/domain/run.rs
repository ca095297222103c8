//! Run domain types
//!
//! A [`Run`] is one instantiation of a pipeline for a specific event. It
//! owns the ordered outcomes of its steps and moves through a small status
//! machine: Pending → Running → {Success, Failure} plus the terminal
//! short-circuits Skipped and Cancelled.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::BuildStatus;

/// Pipeline run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failure,
    /// Trigger status clause did not match the upstream outcome
    Skipped,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Success | RunStatus::Failure | RunStatus::Skipped | RunStatus::Cancelled
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
            RunStatus::Skipped => "skipped",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Outcome status of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failure,
    /// `when` clause did not match; never counts against the run
    Skipped,
    Cancelled,
}

/// Captured result of an executed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl StepResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Recorded outcome of one step within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: String,
    pub status: StepStatus,
    /// Present when the step actually executed
    pub result: Option<StepResult>,
    /// Infrastructure-level error message (container start, secret
    /// resolution), present only on non-exit-code failures
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn skipped(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            status: StepStatus::Skipped,
            result: None,
            error: None,
        }
    }

    pub fn cancelled(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            status: StepStatus::Cancelled,
            result: None,
            error: None,
        }
    }
}

/// One instantiation of a pipeline for a specific event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub pipeline: String,
    pub status: RunStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub steps: Vec<StepOutcome>,
}

impl Run {
    /// Creates a pending run for the named pipeline
    pub fn pending(pipeline: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline: pipeline.into(),
            status: RunStatus::Pending,
            created_at: chrono::Utc::now(),
            started_at: None,
            finished_at: None,
            steps: Vec::new(),
        }
    }

    /// Contribution of this run to the event's aggregate status
    ///
    /// Skipped and cancelled runs carry no signal; only an executed failure
    /// turns the aggregate red.
    pub fn build_status(&self) -> Option<BuildStatus> {
        match self.status {
            RunStatus::Success => Some(BuildStatus::Success),
            RunStatus::Failure => Some(BuildStatus::Failure),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Success.is_terminal());
        assert!(RunStatus::Failure.is_terminal());
        assert!(RunStatus::Skipped.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_build_status_signal() {
        let mut run = Run::pending("cargo-test");
        assert_eq!(run.build_status(), None);

        run.status = RunStatus::Failure;
        assert_eq!(run.build_status(), Some(BuildStatus::Failure));

        run.status = RunStatus::Skipped;
        assert_eq!(run.build_status(), None);
    }
}
