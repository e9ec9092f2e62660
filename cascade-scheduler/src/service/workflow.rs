//! Workflow graph service
//!
//! Loads workflow definitions from the repositories into validated
//! `WorkflowGraph`s and applies graph edits with validate-before-commit
//! semantics: an edit that would leave the graph invalid is rejected and
//! nothing is written.
//!
//! Edits to the same workflow are serialized through a per-workflow lock so
//! two concurrent edits cannot each pass validation against the same
//! snapshot and commit a combination that is invalid.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;
use uuid::Uuid;

use cascade_core::domain::job::{ComponentType, Job};
use cascade_core::domain::workflow::{JobDependency, Workflow};

use crate::dag::{topological_order, WorkflowGraph};
use crate::error::{RouteResult, SchedulerError};
use crate::ports::{DependencyRepository, JobRepository, WorkflowRepository};

/// Graph loading and editing over the repository ports
pub struct WorkflowService {
    workflows: Arc<dyn WorkflowRepository>,
    jobs: Arc<dyn JobRepository>,
    dependencies: Arc<dyn DependencyRepository>,
    edit_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl WorkflowService {
    pub fn new(
        workflows: Arc<dyn WorkflowRepository>,
        jobs: Arc<dyn JobRepository>,
        dependencies: Arc<dyn DependencyRepository>,
    ) -> Self {
        Self {
            workflows,
            jobs,
            dependencies,
            edit_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Loads an active workflow definition
    pub async fn load_workflow(&self, workflow_id: Uuid) -> RouteResult<Workflow> {
        let workflow = self
            .workflows
            .find_by_id(workflow_id)
            .await?
            .filter(|w| w.record_status.is_active())
            .ok_or(SchedulerError::not_found("workflow", workflow_id))?;
        Ok(workflow)
    }

    /// Assembles the workflow's active jobs and edges into a validated graph
    pub async fn load_graph(&self, workflow_id: Uuid) -> RouteResult<WorkflowGraph> {
        self.load_workflow(workflow_id).await?;
        let jobs = self.jobs.list_by_workflow(workflow_id).await?;
        let edges = self.dependencies.list_by_workflow(workflow_id).await?;
        let graph = WorkflowGraph::from_parts(workflow_id, &jobs, &edges)?;
        Ok(graph)
    }

    /// Validates the workflow graph and returns a topological order of its
    /// job ids
    pub async fn validate_workflow(&self, workflow_id: Uuid) -> RouteResult<Vec<Uuid>> {
        let graph = self.load_graph(workflow_id).await?;
        let order = topological_order(&graph)?;
        Ok(order)
    }

    /// Adds a job to the workflow, initially with no dependencies.
    ///
    /// The insert is staged against the loaded graph first, so the node cap
    /// is enforced before anything is persisted.
    pub async fn add_job(
        &self,
        workflow_id: Uuid,
        name: impl Into<String> + Send,
        component: ComponentType,
        parameters: HashMap<String, serde_json::Value>,
    ) -> RouteResult<Job> {
        let lock = self.edit_lock(workflow_id);
        let _guard = lock.lock().await;

        let graph = self.load_graph(workflow_id).await?;
        let mut job = Job::new(workflow_id, name, component);
        job.parameters = parameters;
        graph.with_job(&job)?;
        self.jobs.create(job.clone()).await?;
        info!(workflow_id = %workflow_id, job_id = %job.id, "Job added");
        Ok(job)
    }

    /// Adds a dependency edge (`job_id` runs after `parent_job_id`).
    ///
    /// The edge is committed only if the resulting graph is still valid;
    /// a rejected edit leaves the stored graph untouched.
    pub async fn add_dependency(
        &self,
        workflow_id: Uuid,
        job_id: Uuid,
        parent_job_id: Uuid,
    ) -> RouteResult<()> {
        let lock = self.edit_lock(workflow_id);
        let _guard = lock.lock().await;

        let graph = self.load_graph(workflow_id).await?;
        graph.with_edge(job_id, parent_job_id)?;
        self.dependencies
            .upsert_edge(JobDependency::new(workflow_id, job_id, parent_job_id))
            .await?;
        info!(
            workflow_id = %workflow_id,
            job_id = %job_id,
            parent_job_id = %parent_job_id,
            "Dependency added"
        );
        Ok(())
    }

    /// Soft-deletes a dependency edge
    pub async fn remove_dependency(
        &self,
        workflow_id: Uuid,
        job_id: Uuid,
        parent_job_id: Uuid,
    ) -> RouteResult<()> {
        let lock = self.edit_lock(workflow_id);
        let _guard = lock.lock().await;

        self.load_workflow(workflow_id).await?;
        if !self.dependencies.exists_edge(job_id, parent_job_id).await? {
            return Err(SchedulerError::not_found("dependency", job_id));
        }
        self.dependencies
            .soft_delete_edge(job_id, parent_job_id)
            .await?;
        info!(
            workflow_id = %workflow_id,
            job_id = %job_id,
            parent_job_id = %parent_job_id,
            "Dependency removed"
        );
        Ok(())
    }

    /// Soft-deletes a job along with every edge that touches it
    pub async fn remove_job(&self, workflow_id: Uuid, job_id: Uuid) -> RouteResult<()> {
        let lock = self.edit_lock(workflow_id);
        let _guard = lock.lock().await;

        let job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .filter(|j| j.workflow_id == workflow_id && j.record_status.is_active())
            .ok_or(SchedulerError::not_found("job", job_id))?;

        self.jobs.soft_delete(job.id).await?;
        let edges = self.dependencies.list_by_workflow(workflow_id).await?;
        for edge in edges {
            if edge.record_status.is_active()
                && (edge.job_id == job_id || edge.parent_job_id == job_id)
            {
                self.dependencies
                    .soft_delete_edge(edge.job_id, edge.parent_job_id)
                    .await?;
            }
        }
        info!(workflow_id = %workflow_id, job_id = %job_id, "Job removed");
        Ok(())
    }

    fn edit_lock(&self, workflow_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.edit_locks.lock().expect("edit lock table poisoned");
        Arc::clone(
            locks
                .entry(workflow_id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}
