//! Consumed collaborator interfaces
//!
//! The scheduling core depends on these narrow ports; persistence, heartbeat
//! collection and the actual wire protocol are adapters implemented by the
//! embedding application. Port methods return `anyhow::Result`; the core
//! wraps failures into `SchedulerError::Repository` / `Transport` at the
//! call site.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use cascade_core::domain::executor::ExecutorAddress;
use cascade_core::domain::job::{ComponentType, Job};
use cascade_core::domain::trigger::{TriggerAck, TriggerParam};
use cascade_core::domain::workflow::{JobDependency, Workflow};

/// Workflow persistence
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn find_by_id(&self, workflow_id: Uuid) -> anyhow::Result<Option<Workflow>>;
}

/// Job persistence
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn find_by_id(&self, job_id: Uuid) -> anyhow::Result<Option<Job>>;
    async fn list_by_workflow(&self, workflow_id: Uuid) -> anyhow::Result<Vec<Job>>;
    async fn create(&self, job: Job) -> anyhow::Result<()>;
    async fn update(&self, job: Job) -> anyhow::Result<()>;
    /// Logical delete; the job stays queryable for audit
    async fn soft_delete(&self, job_id: Uuid) -> anyhow::Result<()>;
}

/// Dependency-edge persistence
#[async_trait]
pub trait DependencyRepository: Send + Sync {
    async fn list_by_workflow(&self, workflow_id: Uuid) -> anyhow::Result<Vec<JobDependency>>;
    async fn list_parents_of(&self, job_id: Uuid) -> anyhow::Result<Vec<JobDependency>>;
    async fn upsert_edge(&self, edge: JobDependency) -> anyhow::Result<()>;
    async fn soft_delete_edge(&self, job_id: Uuid, parent_job_id: Uuid) -> anyhow::Result<()>;
    async fn exists_edge(&self, job_id: Uuid, parent_job_id: Uuid) -> anyhow::Result<bool>;
}

/// Supplies the current live address list per component type.
///
/// The executor registry polls this; address liveness itself (heartbeat
/// timeouts, dead entry eviction) is the collaborator's concern.
#[async_trait]
pub trait ExecutorHeartbeatSource: Send + Sync {
    async fn current_pools(&self) -> anyhow::Result<HashMap<ComponentType, Vec<ExecutorAddress>>>;
}

/// Request/response channel to executors
#[async_trait]
pub trait TriggerTransport: Send + Sync {
    /// Sends a trigger and awaits the immediate acknowledgement.
    ///
    /// The dispatcher wraps this call in its configured timeout; an elapsed
    /// timeout counts as a transport failure, not success.
    async fn send(&self, address: &ExecutorAddress, param: &TriggerParam)
    -> anyhow::Result<TriggerAck>;

    /// Cheap liveness probe, used by the failover route strategy
    async fn probe(&self, address: &ExecutorAddress) -> bool;
}

/// Per-address load signal for the least-busy route strategy
pub trait ExecutorLoadSource: Send + Sync {
    /// Pending/in-flight job count currently attributed to the address
    fn inflight(&self, address: &ExecutorAddress) -> usize;
}
