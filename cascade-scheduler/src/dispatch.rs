//! Trigger dispatcher
//!
//! Drives workflow runs to completion:
//! - Claims ready jobs and spawns one dispatch task per job
//! - Routes each trigger through the configured strategy and sends it over
//!   the trigger transport with a timeout
//! - Retries failed dispatches with exponential backoff up to the attempt
//!   budget, then marks the job failed and applies the failure policy
//! - Folds executor completion reports back into the run and claims any
//!   jobs they unblocked
//!
//! Each run is guarded by its own `Mutex<RunState>`; the dispatcher never
//! holds a run lock across a transport call.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use cascade_core::domain::executor::ExecutorAddress;
use cascade_core::domain::trigger::{TriggerAck, TriggerParam};
use cascade_core::domain::workflow::FailurePolicy;
use cascade_core::dto::run::{RunCompletion, RunSnapshot};

use crate::config::SchedulerConfig;
use crate::dag::WorkflowGraph;
use crate::error::{RouteResult, SchedulerError};
use crate::ports::TriggerTransport;
use crate::registry::ExecutorRegistry;
use crate::route::ExecutorRouter;
use crate::run::{CompletionOutcome, RunState};

/// Dispatches job triggers for active workflow runs
pub struct TriggerDispatcher {
    config: SchedulerConfig,
    registry: Arc<ExecutorRegistry>,
    router: Arc<dyn ExecutorRouter>,
    transport: Arc<dyn TriggerTransport>,
    runs: RwLock<HashMap<Uuid, Arc<Mutex<RunState>>>>,
}

impl TriggerDispatcher {
    pub fn new(
        config: SchedulerConfig,
        registry: Arc<ExecutorRegistry>,
        router: Arc<dyn ExecutorRouter>,
        transport: Arc<dyn TriggerTransport>,
    ) -> Self {
        Self {
            config,
            registry,
            router,
            transport,
            runs: RwLock::new(HashMap::new()),
        }
    }

    /// Starts a new run of the given graph and kicks off its root jobs
    pub async fn start_run(
        self: &Arc<Self>,
        graph: Arc<WorkflowGraph>,
        policy: FailurePolicy,
    ) -> Uuid {
        let state = RunState::new(graph, policy);
        let run_id = state.run_id();
        info!(
            run_id = %run_id,
            workflow_id = %state.workflow_id(),
            "Starting workflow run"
        );
        self.runs
            .write()
            .await
            .insert(run_id, Arc::new(Mutex::new(state)));
        self.dispatch_cycle(run_id).await;
        run_id
    }

    /// Snapshot of a run's current status and per-job detail
    pub async fn run_snapshot(&self, run_id: Uuid) -> RouteResult<RunSnapshot> {
        let state = self
            .run_state(run_id)
            .await
            .ok_or(SchedulerError::not_found("run", run_id))?;
        let state = state.lock().await;
        Ok(state.snapshot())
    }

    /// The non-terminal run of a workflow, if one exists
    pub async fn active_run_for(&self, workflow_id: Uuid) -> Option<Uuid> {
        let runs = self.runs.read().await;
        for state in runs.values() {
            let state = state.lock().await;
            if state.workflow_id() == workflow_id && !state.is_terminal() {
                return Some(state.run_id());
            }
        }
        None
    }

    /// Cancels a run; pending jobs are skipped, in-flight jobs finish
    pub async fn cancel(&self, run_id: Uuid) -> RouteResult<RunSnapshot> {
        let state = self
            .run_state(run_id)
            .await
            .ok_or(SchedulerError::not_found("run", run_id))?;
        let mut state = state.lock().await;
        state.request_cancel()?;
        info!(run_id = %run_id, "Run cancellation requested");
        Ok(state.snapshot())
    }

    /// Folds an executor's completion report into its run.
    ///
    /// An applied report may unblock downstream jobs, so a dispatch cycle
    /// follows it.
    pub async fn report_completion(
        self: &Arc<Self>,
        completion: RunCompletion,
    ) -> RouteResult<CompletionOutcome> {
        let state = self
            .run_state(completion.run_id)
            .await
            .ok_or(SchedulerError::not_found("run", completion.run_id))?;
        let outcome = {
            let mut state = state.lock().await;
            state.apply_completion(&completion)
        };
        debug!(
            run_id = %completion.run_id,
            job_id = %completion.job_id,
            success = completion.success,
            ?outcome,
            "Completion report received"
        );
        if outcome == CompletionOutcome::Applied {
            self.dispatch_cycle(completion.run_id).await;
        }
        Ok(outcome)
    }

    /// Drops terminal runs from the in-memory table, returning how many
    /// were removed
    pub async fn sweep_finished(&self) -> usize {
        let mut runs = self.runs.write().await;
        let mut finished = Vec::new();
        for (&run_id, state) in runs.iter() {
            if state.lock().await.is_terminal() {
                finished.push(run_id);
            }
        }
        for run_id in &finished {
            runs.remove(run_id);
        }
        finished.len()
    }

    // =============================================================================
    // Dispatch loop
    // =============================================================================

    /// Claims every ready job and spawns a dispatch task for each
    async fn dispatch_cycle(self: &Arc<Self>, run_id: Uuid) {
        let Some(state) = self.run_state(run_id).await else {
            return;
        };
        let ready = state.lock().await.claim_ready();
        for job_id in ready {
            let dispatcher = Arc::clone(self);
            tokio::spawn(async move {
                dispatcher.dispatch_job(run_id, job_id).await;
            });
        }
    }

    /// Routes and sends one job's trigger, retrying with backoff until it is
    /// dispatched or the attempt budget runs out.
    ///
    /// Boxed so the `dispatch_job` -> `dispatch_cycle` -> `dispatch_job`
    /// recursion has an explicitly `Send` future.
    fn dispatch_job(
        self: Arc<Self>,
        run_id: Uuid,
        job_id: Uuid,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(async move {
        let Some(state) = self.run_state(run_id).await else {
            return;
        };
        loop {
            let (param, attempt) = {
                let mut state = state.lock().await;
                if state.dispatch_blocked() {
                    let reason = if state.cancel_requested() {
                        "run cancelled"
                    } else {
                        "workflow halted"
                    };
                    let _ = state.record_skipped(job_id, reason.to_string());
                    return;
                }
                let graph = state.graph();
                let Some(spec) = graph.spec(job_id) else {
                    return;
                };
                let attempt = state.begin_attempt(job_id);
                let param = TriggerParam {
                    job_id,
                    run_id,
                    workflow_id: state.workflow_id(),
                    component: spec.component.clone(),
                    attempt,
                    parameters: serde_json::to_value(&spec.parameters).unwrap_or_default(),
                };
                (param, attempt)
            };

            match self.attempt_dispatch(&param).await {
                Ok((address, ack)) => {
                    let job_terminal = {
                        let mut state = state.lock().await;
                        let running = matches!(ack, TriggerAck::Queued);
                        let replay = match state.record_dispatched(job_id, address, running) {
                            Ok(replay) => replay,
                            Err(err) => {
                                warn!(run_id = %run_id, job_id = %job_id, %err, "Dropping dispatch record");
                                return;
                            }
                        };
                        if let TriggerAck::Completed { success, message } = ack {
                            if let Err(err) = state.record_outcome(job_id, success, message) {
                                warn!(run_id = %run_id, job_id = %job_id, %err, "Dropping in-band outcome");
                            }
                        }
                        if let Some(completion) = replay {
                            state.apply_completion(&completion);
                        }
                        state.job_status(job_id).is_some_and(|s| s.is_terminal())
                    };
                    // A job that finished in-band can unblock its children now
                    if job_terminal {
                        self.dispatch_cycle(run_id).await;
                    }
                    return;
                }
                Err(err) if attempt >= self.config.max_attempts => {
                    warn!(
                        run_id = %run_id,
                        job_id = %job_id,
                        attempts = attempt,
                        %err,
                        "Dispatch attempts exhausted, failing job"
                    );
                    {
                        let mut state = state.lock().await;
                        let _ = state.record_exhausted(job_id, err.to_string());
                    }
                    // The failure policy may have skipped downstream jobs;
                    // re-derive what is still dispatchable
                    self.dispatch_cycle(run_id).await;
                    return;
                }
                Err(err) => {
                    debug!(
                        run_id = %run_id,
                        job_id = %job_id,
                        attempt,
                        %err,
                        "Dispatch attempt failed, retrying"
                    );
                    {
                        let mut state = state.lock().await;
                        let _ = state.record_route_failure(job_id, err.to_string());
                    }
                    tokio::time::sleep(self.config.backoff_for(attempt)).await;
                }
            }
        }
        })
    }

    /// One routing + transport attempt for a trigger
    async fn attempt_dispatch(
        &self,
        param: &TriggerParam,
    ) -> RouteResult<(ExecutorAddress, TriggerAck)> {
        let pool = self
            .registry
            .addresses(&param.component)
            .filter(|pool| !pool.is_empty())
            .ok_or_else(|| SchedulerError::no_available_executor(&param.component))?;
        let address = self.router.route(param, &pool).await?;
        let ack = tokio::time::timeout(
            self.config.trigger_timeout,
            self.transport.send(&address, param),
        )
        .await
        .map_err(|_| SchedulerError::Transport {
            address: address.to_string(),
            reason: "trigger timed out".to_string(),
        })?
        .map_err(|err| SchedulerError::Transport {
            address: address.to_string(),
            reason: err.to_string(),
        })?;
        Ok((address, ack))
    }

    async fn run_state(&self, run_id: Uuid) -> Option<Arc<Mutex<RunState>>> {
        self.runs.read().await.get(&run_id).cloned()
    }
}
