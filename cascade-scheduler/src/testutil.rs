//! In-memory test doubles for the repository and transport ports

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use cascade_core::domain::executor::ExecutorAddress;
use cascade_core::domain::job::{Job, RecordStatus};
use cascade_core::domain::trigger::{TriggerAck, TriggerParam};
use cascade_core::domain::workflow::{JobDependency, Workflow};

use crate::ports::{DependencyRepository, JobRepository, TriggerTransport, WorkflowRepository};

/// Opt-in log output while debugging tests: `RUST_LOG=debug cargo test`
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Transport
// =============================================================================

enum SendBehavior {
    Complete,
    Queue,
    Fail(String),
}

/// Records every trigger it receives and answers with a fixed behavior
pub(crate) struct MockTransport {
    behavior: SendBehavior,
    sent: Mutex<Vec<TriggerParam>>,
}

impl MockTransport {
    /// Every send succeeds with an in-band successful completion
    pub(crate) fn completing() -> Self {
        Self {
            behavior: SendBehavior::Complete,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Every send is acknowledged as queued; completion comes via callback
    pub(crate) fn queueing() -> Self {
        Self {
            behavior: SendBehavior::Queue,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Every send fails with the given reason
    pub(crate) fn failing(reason: &str) -> Self {
        Self {
            behavior: SendBehavior::Fail(reason.to_string()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Job ids in the order their triggers were sent
    pub(crate) fn sent_job_ids(&self) -> Vec<Uuid> {
        self.sent
            .lock()
            .expect("sent lock poisoned")
            .iter()
            .map(|param| param.job_id)
            .collect()
    }

    /// Blocks until at least `count` triggers have been sent
    pub(crate) async fn wait_for_sends(&self, count: usize) {
        for _ in 0..500 {
            if self.sent.lock().expect("sent lock poisoned").len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("transport never saw {count} sends");
    }

    /// Blocks until a trigger for `job_id` has been sent
    pub(crate) async fn wait_for_send_of(&self, job_id: Uuid) {
        for _ in 0..500 {
            if self.sent_job_ids().contains(&job_id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("transport never saw a trigger for {job_id}");
    }
}

#[async_trait]
impl TriggerTransport for MockTransport {
    async fn send(
        &self,
        _address: &ExecutorAddress,
        param: &TriggerParam,
    ) -> anyhow::Result<TriggerAck> {
        match &self.behavior {
            SendBehavior::Fail(reason) => anyhow::bail!("{reason}"),
            SendBehavior::Complete => {
                self.sent
                    .lock()
                    .expect("sent lock poisoned")
                    .push(param.clone());
                Ok(TriggerAck::Completed {
                    success: true,
                    message: None,
                })
            }
            SendBehavior::Queue => {
                self.sent
                    .lock()
                    .expect("sent lock poisoned")
                    .push(param.clone());
                Ok(TriggerAck::Queued)
            }
        }
    }

    async fn probe(&self, _address: &ExecutorAddress) -> bool {
        true
    }
}

// =============================================================================
// Repositories
// =============================================================================

/// In-memory store backing all three repository ports
#[derive(Default)]
pub(crate) struct InMemoryStore {
    workflows: Mutex<HashMap<Uuid, Workflow>>,
    jobs: Mutex<HashMap<Uuid, Job>>,
    edges: Mutex<Vec<JobDependency>>,
}

impl InMemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn seed_workflow(&self, workflow: Workflow) {
        self.workflows
            .lock()
            .expect("workflows lock poisoned")
            .insert(workflow.id, workflow);
    }

    pub(crate) fn seed_job(&self, job: Job) {
        self.jobs
            .lock()
            .expect("jobs lock poisoned")
            .insert(job.id, job);
    }

    pub(crate) fn seed_edge(&self, edge: JobDependency) {
        self.edges.lock().expect("edges lock poisoned").push(edge);
    }

    pub(crate) fn active_edge_count(&self, workflow_id: Uuid) -> usize {
        self.edges
            .lock()
            .expect("edges lock poisoned")
            .iter()
            .filter(|e| e.workflow_id == workflow_id && e.record_status.is_active())
            .count()
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryStore {
    async fn find_by_id(&self, workflow_id: Uuid) -> anyhow::Result<Option<Workflow>> {
        Ok(self
            .workflows
            .lock()
            .expect("workflows lock poisoned")
            .get(&workflow_id)
            .cloned())
    }
}

#[async_trait]
impl JobRepository for InMemoryStore {
    async fn find_by_id(&self, job_id: Uuid) -> anyhow::Result<Option<Job>> {
        Ok(self
            .jobs
            .lock()
            .expect("jobs lock poisoned")
            .get(&job_id)
            .cloned())
    }

    async fn list_by_workflow(&self, workflow_id: Uuid) -> anyhow::Result<Vec<Job>> {
        Ok(self
            .jobs
            .lock()
            .expect("jobs lock poisoned")
            .values()
            .filter(|job| job.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn create(&self, job: Job) -> anyhow::Result<()> {
        self.jobs
            .lock()
            .expect("jobs lock poisoned")
            .insert(job.id, job);
        Ok(())
    }

    async fn update(&self, job: Job) -> anyhow::Result<()> {
        self.jobs
            .lock()
            .expect("jobs lock poisoned")
            .insert(job.id, job);
        Ok(())
    }

    async fn soft_delete(&self, job_id: Uuid) -> anyhow::Result<()> {
        if let Some(job) = self
            .jobs
            .lock()
            .expect("jobs lock poisoned")
            .get_mut(&job_id)
        {
            job.record_status = RecordStatus::Deleted;
        }
        Ok(())
    }
}

#[async_trait]
impl DependencyRepository for InMemoryStore {
    async fn list_by_workflow(&self, workflow_id: Uuid) -> anyhow::Result<Vec<JobDependency>> {
        Ok(self
            .edges
            .lock()
            .expect("edges lock poisoned")
            .iter()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn list_parents_of(&self, job_id: Uuid) -> anyhow::Result<Vec<JobDependency>> {
        Ok(self
            .edges
            .lock()
            .expect("edges lock poisoned")
            .iter()
            .filter(|e| e.job_id == job_id && e.record_status.is_active())
            .cloned()
            .collect())
    }

    async fn upsert_edge(&self, edge: JobDependency) -> anyhow::Result<()> {
        let mut edges = self.edges.lock().expect("edges lock poisoned");
        edges.retain(|e| !(e.job_id == edge.job_id && e.parent_job_id == edge.parent_job_id));
        edges.push(edge);
        Ok(())
    }

    async fn soft_delete_edge(&self, job_id: Uuid, parent_job_id: Uuid) -> anyhow::Result<()> {
        for edge in self
            .edges
            .lock()
            .expect("edges lock poisoned")
            .iter_mut()
        {
            if edge.job_id == job_id && edge.parent_job_id == parent_job_id {
                edge.record_status = RecordStatus::Deleted;
            }
        }
        Ok(())
    }

    async fn exists_edge(&self, job_id: Uuid, parent_job_id: Uuid) -> anyhow::Result<bool> {
        Ok(self
            .edges
            .lock()
            .expect("edges lock poisoned")
            .iter()
            .any(|e| {
                e.job_id == job_id && e.parent_job_id == parent_job_id && e.record_status.is_active()
            }))
    }
}
