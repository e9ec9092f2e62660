//! Error types for the scheduling core
//!
//! Every routing and dispatch operation returns a `RouteResult` so callers
//! must branch on success/failure explicitly; failures carry a precise
//! reason (rule name, missing resource, timeout) rather than a generic
//! message.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for scheduler operations
pub type RouteResult<T> = std::result::Result<T, SchedulerError>;

/// Errors surfaced by the scheduling core
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Cyclic or structural graph violation; the offending edit is rejected
    /// and stored state is left untouched.
    #[error("workflow validation failed: {0}")]
    Validation(DagViolation),

    /// No viable executor address for a trigger
    #[error("routing failed: {reason}")]
    Routing { reason: String },

    /// Timeout or unreachable executor; retried per the retry policy
    #[error("transport failure for {address}: {reason}")]
    Transport { address: String, reason: String },

    /// Concurrent edit or stale run reference; retry against latest state
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// Referenced resource does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    /// Failure inside a consumed repository/heartbeat collaborator
    #[error("repository error: {0}")]
    Repository(#[from] anyhow::Error),
}

impl SchedulerError {
    /// The defined failure for routing against an empty candidate list
    pub fn no_available_executor(component: &cascade_core::domain::job::ComponentType) -> Self {
        Self::Routing {
            reason: format!("no available executor for component type '{component}'"),
        }
    }

    pub fn routing(reason: impl Into<String>) -> Self {
        Self::Routing {
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }

    /// Check if this error is a graph validation rejection
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// A violated graph rule with the offending node/edge set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DagViolation {
    /// Minimal cycle found by the validator; `path` lists the nodes along
    /// the cycle in edge order, closing back to the first entry.
    Cycle { path: Vec<Uuid> },
    /// Edge from a job to itself
    SelfLoop { job_id: Uuid },
    /// Edge endpoint references a job the workflow does not contain
    UnknownEndpoint {
        job_id: Uuid,
        parent_job_id: Uuid,
        missing: Uuid,
    },
    /// Edge endpoint references a soft-deleted job
    DeletedEndpoint {
        job_id: Uuid,
        parent_job_id: Uuid,
        deleted: Uuid,
    },
    /// Second edge for the same ordered (job, parent) pair
    DuplicateEdge { job_id: Uuid, parent_job_id: Uuid },
    /// Graph exceeds the node cap
    TooManyNodes { count: usize, max: usize },
}

impl DagViolation {
    /// Stable rule name, reported to callers alongside the detail
    pub fn rule(&self) -> &'static str {
        match self {
            Self::Cycle { .. } => "cycle",
            Self::SelfLoop { .. } => "self-loop",
            Self::UnknownEndpoint { .. } => "unknown-endpoint",
            Self::DeletedEndpoint { .. } => "deleted-endpoint",
            Self::DuplicateEdge { .. } => "duplicate-edge",
            Self::TooManyNodes { .. } => "too-many-nodes",
        }
    }
}

impl std::fmt::Display for DagViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cycle { path } => {
                let nodes: Vec<String> = path.iter().map(|n| n.to_string()).collect();
                write!(f, "rule 'cycle': {} -> (back to start)", nodes.join(" -> "))
            }
            Self::SelfLoop { job_id } => {
                write!(f, "rule 'self-loop': job {job_id} depends on itself")
            }
            Self::UnknownEndpoint {
                job_id,
                parent_job_id,
                missing,
            } => write!(
                f,
                "rule 'unknown-endpoint': edge ({job_id} <- {parent_job_id}) references missing job {missing}"
            ),
            Self::DeletedEndpoint {
                job_id,
                parent_job_id,
                deleted,
            } => write!(
                f,
                "rule 'deleted-endpoint': edge ({job_id} <- {parent_job_id}) references deleted job {deleted}"
            ),
            Self::DuplicateEdge {
                job_id,
                parent_job_id,
            } => write!(
                f,
                "rule 'duplicate-edge': edge ({job_id} <- {parent_job_id}) already exists"
            ),
            Self::TooManyNodes { count, max } => {
                write!(f, "rule 'too-many-nodes': {count} jobs exceeds the cap of {max}")
            }
        }
    }
}

impl From<DagViolation> for SchedulerError {
    fn from(violation: DagViolation) -> Self {
        SchedulerError::Validation(violation)
    }
}
