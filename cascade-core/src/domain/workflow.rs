//! Workflow domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::RecordStatus;

/// Workflow definition
///
/// A named collection of jobs plus the dependency edges among them.
/// Identity is stable across runs; the job graph is mutated by editing
/// operations that re-validate the whole graph before committing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// `None` inherits the scheduler-wide default policy
    pub failure_policy: Option<FailurePolicy>,
    pub record_status: RecordStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            failure_policy: None,
            record_status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What happens to the rest of a run when one job fails for good
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Skip the failed job's transitive downstream, keep independent
    /// branches running.
    #[default]
    CascadeSkip,
    /// Stop dispatching new jobs entirely; in-flight jobs finish.
    FailFast,
}

/// Directed dependency edge: `job_id` runs after `parent_job_id`
///
/// Owned by the workflow that declares it. No duplicate edge for the same
/// ordered pair, no self-loop; both enforced by graph validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDependency {
    pub workflow_id: Uuid,
    pub job_id: Uuid,
    pub parent_job_id: Uuid,
    pub record_status: RecordStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl JobDependency {
    pub fn new(workflow_id: Uuid, job_id: Uuid, parent_job_id: Uuid) -> Self {
        Self {
            workflow_id,
            job_id,
            parent_job_id,
            record_status: RecordStatus::Active,
            created_at: chrono::Utc::now(),
        }
    }
}
