//! Run status DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::run::{JobRun, JobRunStatus, RunStatus, WorkflowRun};

/// Point-in-time view of a workflow run, for status queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub workflow_id: Uuid,
    pub status: RunStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Per-job state, ordered by ascending job id
    pub jobs: Vec<JobRunView>,
}

/// Per-job slice of a run snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRunView {
    pub job_id: Uuid,
    pub status: JobRunStatus,
    pub attempts: u32,
    pub failure_reason: Option<String>,
    pub executor: Option<String>,
    pub dispatched_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<&JobRun> for JobRunView {
    fn from(job: &JobRun) -> Self {
        Self {
            job_id: job.job_id,
            status: job.status,
            attempts: job.attempts,
            failure_reason: job.failure_reason.clone(),
            executor: job.executor.as_ref().map(|a| a.to_string()),
            dispatched_at: job.dispatched_at,
            finished_at: job.finished_at,
        }
    }
}

impl From<&WorkflowRun> for RunSnapshot {
    fn from(run: &WorkflowRun) -> Self {
        let mut jobs: Vec<JobRunView> = run.jobs.values().map(JobRunView::from).collect();
        jobs.sort_by_key(|j| j.job_id);
        Self {
            run_id: run.id,
            workflow_id: run.workflow_id,
            status: run.status,
            started_at: run.started_at,
            finished_at: run.finished_at,
            jobs,
        }
    }
}

/// Inbound completion report for an asynchronously executed job
///
/// Sent by executors (through whatever callback adapter the embedding
/// application wires up) once a dispatched job finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCompletion {
    pub run_id: Uuid,
    pub job_id: Uuid,
    pub success: bool,
    pub message: Option<String>,
}
