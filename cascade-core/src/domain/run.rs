//! Workflow run state machine
//!
//! Per-run status for every participating job, independent of the job's
//! template definition. Job run statuses only move forward; the run status
//! is derived from the constituent job statuses on every transition and is
//! never cached.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::executor::ExecutorAddress;

/// Status of one job within one workflow run
///
/// `Pending -> (RouteFailed | Dispatched) -> Running -> (Succeeded | Failed)`,
/// plus `Skipped` reachable from the pre-dispatch states when an ancestor's
/// failure prunes the branch or the run is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobRunStatus {
    Pending,
    RouteFailed,
    Dispatched,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl JobRunStatus {
    /// Terminal statuses never transition again
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }

    /// Whether a parent in this status unlocks its children
    pub fn is_terminal_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Forward-only transition rule
    ///
    /// `RouteFailed -> RouteFailed` is allowed so that each failed routing
    /// attempt can be recorded during a retry sequence.
    pub fn can_transition_to(self, next: JobRunStatus) -> bool {
        use JobRunStatus::*;
        match self {
            Pending => matches!(next, RouteFailed | Dispatched | Skipped),
            RouteFailed => matches!(next, RouteFailed | Dispatched | Failed | Skipped),
            Dispatched => matches!(next, Running | Succeeded | Failed),
            Running => matches!(next, Succeeded | Failed),
            Succeeded | Failed | Skipped => false,
        }
    }
}

/// Derived status of a whole workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Recomputes the run status from its job statuses.
    ///
    /// `Running` while any job is non-terminal; once everything is terminal,
    /// a requested cancellation wins, then any failure, otherwise success.
    pub fn derive(
        statuses: impl IntoIterator<Item = JobRunStatus>,
        cancel_requested: bool,
    ) -> RunStatus {
        let mut any_failed = false;
        for status in statuses {
            if !status.is_terminal() {
                return RunStatus::Running;
            }
            if status == JobRunStatus::Failed {
                any_failed = true;
            }
        }
        if cancel_requested {
            RunStatus::Cancelled
        } else if any_failed {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        }
    }
}

/// Execution record of one job within one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
    pub job_id: Uuid,
    pub status: JobRunStatus,
    /// Routing/transport attempts consumed so far
    pub attempts: u32,
    /// Why the job last failed routing, failed for good, or was skipped
    pub failure_reason: Option<String>,
    /// Executor the job was dispatched to, once routed
    pub executor: Option<ExecutorAddress>,
    pub dispatched_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl JobRun {
    pub fn pending(job_id: Uuid) -> Self {
        Self {
            job_id,
            status: JobRunStatus::Pending,
            attempts: 0,
            failure_reason: None,
            executor: None,
            dispatched_at: None,
            finished_at: None,
        }
    }
}

/// One execution instance of a workflow
///
/// Exists from trigger time until a terminal state is reached, and is
/// retained afterwards for history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: RunStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub jobs: std::collections::HashMap<Uuid, JobRun>,
}

impl WorkflowRun {
    /// Creates a run with every participating job pending
    pub fn start(workflow_id: Uuid, job_ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            status: RunStatus::Running,
            started_at: chrono::Utc::now(),
            finished_at: None,
            jobs: job_ids
                .into_iter()
                .map(|id| (id, JobRun::pending(id)))
                .collect(),
        }
    }
}
