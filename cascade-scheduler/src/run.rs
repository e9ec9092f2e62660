//! Per-run scheduling state
//!
//! Wraps a `WorkflowRun` with the bookkeeping the dispatcher needs: the
//! claim set that keeps a job from being dispatched twice between the
//! readiness computation and its status write, the attempt counters for the
//! retry policy, the cancel/halt flags, and the buffer for completion
//! callbacks that arrive before the dispatch record exists.
//!
//! All methods assume the caller holds the run's lock; the dispatcher keeps
//! one `Mutex<RunState>` per run so readiness computation is serialized with
//! status updates for that run while runs stay independent of each other.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use cascade_core::domain::executor::ExecutorAddress;
use cascade_core::domain::run::{JobRunStatus, RunStatus, WorkflowRun};
use cascade_core::domain::workflow::FailurePolicy;
use cascade_core::dto::run::{RunCompletion, RunSnapshot};

use crate::dag::WorkflowGraph;
use crate::error::SchedulerError;

/// How an inbound completion report was folded into the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Folded into the state machine
    Applied,
    /// Arrived before the dispatch record; buffered for replay
    Buffered,
    /// Job unknown or already terminal; ignored
    Stale,
}

/// Mutable state of one workflow run
pub struct RunState {
    run: WorkflowRun,
    graph: Arc<WorkflowGraph>,
    policy: FailurePolicy,
    claimed: HashSet<Uuid>,
    cancel_requested: bool,
    halted: bool,
    buffered: HashMap<Uuid, RunCompletion>,
}

impl RunState {
    pub fn new(graph: Arc<WorkflowGraph>, policy: FailurePolicy) -> Self {
        let run = WorkflowRun::start(graph.workflow_id(), graph.job_ids());
        let mut state = Self {
            run,
            graph,
            policy,
            claimed: HashSet::new(),
            cancel_requested: false,
            halted: false,
            buffered: HashMap::new(),
        };
        // A run over zero jobs is terminal from the start
        state.refresh();
        state
    }

    pub fn run_id(&self) -> Uuid {
        self.run.id
    }

    pub fn workflow_id(&self) -> Uuid {
        self.run.workflow_id
    }

    pub fn status(&self) -> RunStatus {
        self.run.status
    }

    pub fn is_terminal(&self) -> bool {
        self.run.status.is_terminal()
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    /// True once no further dispatches should be attempted for this run
    pub(crate) fn dispatch_blocked(&self) -> bool {
        self.is_terminal() || self.cancel_requested || self.halted
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot::from(&self.run)
    }

    pub fn graph(&self) -> Arc<WorkflowGraph> {
        Arc::clone(&self.graph)
    }

    pub fn job_status(&self, job_id: Uuid) -> Option<JobRunStatus> {
        self.run.jobs.get(&job_id).map(|j| j.status)
    }

    pub fn attempts(&self, job_id: Uuid) -> u32 {
        self.run.jobs.get(&job_id).map_or(0, |j| j.attempts)
    }

    // =============================================================================
    // Dispatch bookkeeping
    // =============================================================================

    /// Computes the ready set and claims it for dispatch.
    ///
    /// Claimed jobs are excluded from later calls until their status leaves
    /// `Pending`, so two overlapping dispatch cycles can never pick up the
    /// same job.
    pub(crate) fn claim_ready(&mut self) -> Vec<Uuid> {
        if self.is_terminal() || self.cancel_requested || self.halted {
            return Vec::new();
        }
        let statuses: HashMap<Uuid, JobRunStatus> = self
            .run
            .jobs
            .iter()
            .map(|(&id, job)| (id, job.status))
            .collect();
        let ready: Vec<Uuid> = self
            .graph
            .ready_jobs(&statuses)
            .into_iter()
            .filter(|id| !self.claimed.contains(id))
            .collect();
        self.claimed.extend(ready.iter().copied());
        ready
    }

    /// Bumps and returns the attempt counter for a claimed job
    pub(crate) fn begin_attempt(&mut self, job_id: Uuid) -> u32 {
        match self.run.jobs.get_mut(&job_id) {
            Some(job) => {
                job.attempts += 1;
                job.attempts
            }
            None => 0,
        }
    }

    /// Records one failed routing/transport attempt; the job stays claimed
    /// and eligible for retry.
    pub(crate) fn record_route_failure(
        &mut self,
        job_id: Uuid,
        reason: String,
    ) -> Result<(), SchedulerError> {
        self.set_status(job_id, JobRunStatus::RouteFailed, Some(reason))
    }

    /// Records a successful dispatch to `address` and releases the claim.
    ///
    /// Returns a completion report that arrived while the job was still in
    /// flight to the executor; the caller must fold it in immediately.
    pub(crate) fn record_dispatched(
        &mut self,
        job_id: Uuid,
        address: ExecutorAddress,
        running: bool,
    ) -> Result<Option<RunCompletion>, SchedulerError> {
        {
            let job = self
                .run
                .jobs
                .get_mut(&job_id)
                .ok_or(SchedulerError::not_found("job", job_id))?;
            job.executor = Some(address);
            job.dispatched_at = Some(chrono::Utc::now());
        }
        self.set_status(job_id, JobRunStatus::Dispatched, None)?;
        if running {
            self.set_status(job_id, JobRunStatus::Running, None)?;
        }
        self.claimed.remove(&job_id);
        Ok(self.buffered.remove(&job_id))
    }

    /// Terminal outcome of an executed job
    pub(crate) fn record_outcome(
        &mut self,
        job_id: Uuid,
        success: bool,
        message: Option<String>,
    ) -> Result<(), SchedulerError> {
        let next = if success {
            JobRunStatus::Succeeded
        } else {
            JobRunStatus::Failed
        };
        self.set_status(job_id, next, message)?;
        if !success {
            self.apply_failure_policy(job_id);
        }
        Ok(())
    }

    /// Marks a job failed after its retry budget is exhausted
    pub(crate) fn record_exhausted(
        &mut self,
        job_id: Uuid,
        reason: String,
    ) -> Result<(), SchedulerError> {
        self.claimed.remove(&job_id);
        // A single-attempt budget can exhaust straight out of Pending
        if self.job_status(job_id) == Some(JobRunStatus::Pending) {
            self.set_status(job_id, JobRunStatus::RouteFailed, None)?;
        }
        self.set_status(job_id, JobRunStatus::Failed, Some(reason))?;
        self.apply_failure_policy(job_id);
        Ok(())
    }

    /// Skips a claimed job that will not be dispatched (cancel/halt)
    pub(crate) fn record_skipped(
        &mut self,
        job_id: Uuid,
        reason: String,
    ) -> Result<(), SchedulerError> {
        self.claimed.remove(&job_id);
        self.set_status(job_id, JobRunStatus::Skipped, Some(reason))
    }

    /// Folds an inbound completion report into the state machine.
    ///
    /// A report for a job whose dispatch record is not written yet is
    /// buffered and replayed by `record_dispatched`; a report for an
    /// unknown or already-terminal job is ignored as stale.
    pub(crate) fn apply_completion(&mut self, completion: &RunCompletion) -> CompletionOutcome {
        match self.job_status(completion.job_id) {
            Some(JobRunStatus::Dispatched | JobRunStatus::Running) => {
                // Transition is legal from both states, so the error arm is unreachable
                let _ = self.record_outcome(
                    completion.job_id,
                    completion.success,
                    completion.message.clone(),
                );
                CompletionOutcome::Applied
            }
            Some(JobRunStatus::Pending | JobRunStatus::RouteFailed) => {
                debug!(
                    job_id = %completion.job_id,
                    "Completion arrived before dispatch record, buffering"
                );
                self.buffered.insert(completion.job_id, completion.clone());
                CompletionOutcome::Buffered
            }
            _ => CompletionOutcome::Stale,
        }
    }

    /// Requests cancellation: pending jobs are skipped immediately, in-flight
    /// jobs run to completion, and the run derives `Cancelled` once nothing
    /// is running or dispatched.
    pub(crate) fn request_cancel(&mut self) -> Result<(), SchedulerError> {
        if self.is_terminal() {
            return Err(SchedulerError::StateConflict(format!(
                "run {} is already terminal",
                self.run.id
            )));
        }
        self.cancel_requested = true;
        self.skip_undispatched("run cancelled");
        self.refresh();
        Ok(())
    }

    // =============================================================================
    // Internals
    // =============================================================================

    fn set_status(
        &mut self,
        job_id: Uuid,
        next: JobRunStatus,
        reason: Option<String>,
    ) -> Result<(), SchedulerError> {
        let job = self
            .run
            .jobs
            .get_mut(&job_id)
            .ok_or(SchedulerError::not_found("job", job_id))?;
        if !job.status.can_transition_to(next) {
            return Err(SchedulerError::StateConflict(format!(
                "job {job_id} cannot transition {:?} -> {next:?}",
                job.status
            )));
        }
        job.status = next;
        if let Some(reason) = reason {
            job.failure_reason = Some(reason);
        }
        if next.is_terminal() {
            job.finished_at = Some(chrono::Utc::now());
        }
        self.refresh();
        Ok(())
    }

    fn apply_failure_policy(&mut self, failed_job: Uuid) {
        match self.policy {
            FailurePolicy::CascadeSkip => {
                let reason = format!("upstream job {failed_job} failed");
                for job_id in self.graph.downstream_of(failed_job) {
                    if matches!(
                        self.job_status(job_id),
                        Some(JobRunStatus::Pending | JobRunStatus::RouteFailed)
                    ) && !self.claimed.contains(&job_id)
                    {
                        let _ = self.set_status(job_id, JobRunStatus::Skipped, Some(reason.clone()));
                    }
                }
            }
            FailurePolicy::FailFast => {
                self.halted = true;
                self.skip_undispatched("workflow failed fast");
            }
        }
        self.refresh();
    }

    fn skip_undispatched(&mut self, reason: &str) {
        let skip: Vec<Uuid> = self
            .run
            .jobs
            .values()
            .filter(|job| {
                matches!(
                    job.status,
                    JobRunStatus::Pending | JobRunStatus::RouteFailed
                ) && !self.claimed.contains(&job.job_id)
            })
            .map(|job| job.job_id)
            .collect();
        for job_id in skip {
            let _ = self.set_status(job_id, JobRunStatus::Skipped, Some(reason.to_string()));
        }
    }

    /// Re-derives the run status from job statuses; never cached stale
    fn refresh(&mut self) {
        self.run.status = RunStatus::derive(
            self.run.jobs.values().map(|j| j.status),
            self.cancel_requested,
        );
        if self.run.status.is_terminal() && self.run.finished_at.is_none() {
            self.run.finished_at = Some(chrono::Utc::now());
        }
    }
}
