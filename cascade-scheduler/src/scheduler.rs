//! Scheduler facade
//!
//! Wires the workflow service, executor registry, router, and trigger
//! dispatcher together behind one handle. This is the surface an embedding
//! server exposes: trigger and cancel runs, report completions, edit and
//! validate workflow graphs.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use cascade_core::domain::job::{ComponentType, Job};
use cascade_core::dto::run::{RunCompletion, RunSnapshot};

use crate::config::SchedulerConfig;
use crate::dispatch::TriggerDispatcher;
use crate::error::{RouteResult, SchedulerError};
use crate::ports::{
    DependencyRepository, ExecutorHeartbeatSource, ExecutorLoadSource, JobRepository,
    TriggerTransport, WorkflowRepository,
};
use crate::registry::ExecutorRegistry;
use crate::route::build_router;
use crate::run::CompletionOutcome;
use crate::service::WorkflowService;

/// Entry point composing the scheduling core
pub struct Scheduler {
    config: SchedulerConfig,
    workflows: WorkflowService,
    registry: Arc<ExecutorRegistry>,
    dispatcher: Arc<TriggerDispatcher>,
}

impl Scheduler {
    /// Builds a scheduler over the given ports.
    ///
    /// Fails if the configured route strategy cannot be built, e.g.
    /// `least_busy` without a load source.
    pub fn new(
        config: SchedulerConfig,
        workflows: Arc<dyn WorkflowRepository>,
        jobs: Arc<dyn JobRepository>,
        dependencies: Arc<dyn DependencyRepository>,
        transport: Arc<dyn TriggerTransport>,
        load_source: Option<Arc<dyn ExecutorLoadSource>>,
    ) -> RouteResult<Self> {
        let registry = Arc::new(ExecutorRegistry::new());
        let router = build_router(config.route_strategy, Arc::clone(&transport), load_source)?;
        let dispatcher = Arc::new(TriggerDispatcher::new(
            config.clone(),
            Arc::clone(&registry),
            router,
            transport,
        ));
        info!(strategy = ?config.route_strategy, "Scheduler initialized");
        Ok(Self {
            config,
            workflows: WorkflowService::new(workflows, jobs, dependencies),
            registry,
            dispatcher,
        })
    }

    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    /// Spawns the background task that rebuilds executor pools from
    /// heartbeats at the configured cadence
    pub fn start_registry_refresh(
        &self,
        source: Arc<dyn ExecutorHeartbeatSource>,
    ) -> tokio::task::JoinHandle<()> {
        self.registry
            .start_refresh_task(source, self.config.registry_refresh_interval)
    }

    // =============================================================================
    // Runs
    // =============================================================================

    /// Starts a run of the workflow and returns its run id.
    ///
    /// Rejected with a state conflict while an earlier run of the same
    /// workflow is still active, and for workflows with no jobs.
    pub async fn trigger_workflow(&self, workflow_id: Uuid) -> RouteResult<Uuid> {
        let workflow = self.workflows.load_workflow(workflow_id).await?;
        if let Some(active) = self.dispatcher.active_run_for(workflow_id).await {
            return Err(SchedulerError::StateConflict(format!(
                "workflow {workflow_id} already has active run {active}"
            )));
        }
        let graph = self.workflows.load_graph(workflow_id).await?;
        if graph.is_empty() {
            return Err(SchedulerError::StateConflict(format!(
                "workflow {workflow_id} has no jobs"
            )));
        }
        let policy = workflow
            .failure_policy
            .unwrap_or(self.config.default_failure_policy);
        let run_id = self.dispatcher.start_run(Arc::new(graph), policy).await;
        Ok(run_id)
    }

    pub async fn run_status(&self, run_id: Uuid) -> RouteResult<RunSnapshot> {
        self.dispatcher.run_snapshot(run_id).await
    }

    pub async fn cancel_run(&self, run_id: Uuid) -> RouteResult<RunSnapshot> {
        self.dispatcher.cancel(run_id).await
    }

    /// Executor callback path for asynchronously completing jobs
    pub async fn report_completion(
        &self,
        completion: RunCompletion,
    ) -> RouteResult<CompletionOutcome> {
        self.dispatcher.report_completion(completion).await
    }

    /// Drops finished runs from the in-memory run table
    pub async fn sweep_finished_runs(&self) -> usize {
        self.dispatcher.sweep_finished().await
    }

    // =============================================================================
    // Graph editing
    // =============================================================================

    pub async fn validate_workflow(&self, workflow_id: Uuid) -> RouteResult<Vec<Uuid>> {
        self.workflows.validate_workflow(workflow_id).await
    }

    pub async fn add_job(
        &self,
        workflow_id: Uuid,
        name: impl Into<String> + Send,
        component: ComponentType,
        parameters: HashMap<String, serde_json::Value>,
    ) -> RouteResult<Job> {
        self.workflows
            .add_job(workflow_id, name, component, parameters)
            .await
    }

    pub async fn add_dependency(
        &self,
        workflow_id: Uuid,
        job_id: Uuid,
        parent_job_id: Uuid,
    ) -> RouteResult<()> {
        self.workflows
            .add_dependency(workflow_id, job_id, parent_job_id)
            .await
    }

    pub async fn remove_dependency(
        &self,
        workflow_id: Uuid,
        job_id: Uuid,
        parent_job_id: Uuid,
    ) -> RouteResult<()> {
        self.workflows
            .remove_dependency(workflow_id, job_id, parent_job_id)
            .await
    }

    pub async fn remove_job(&self, workflow_id: Uuid, job_id: Uuid) -> RouteResult<()> {
        self.workflows.remove_job(workflow_id, job_id).await
    }
}
