//! Job domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Executable kind of a job (e.g. "shell", "sql", "python").
///
/// The scheduler treats this as opaque: executors register per component
/// type, and routing groups address pools by it. What a component type
/// actually does to the job parameters is the executor's business.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentType(String);

impl ComponentType {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentType {
    fn from(kind: &str) -> Self {
        Self(kind.to_string())
    }
}

/// Logical-delete marker.
///
/// Deleted rows are excluded from active graphs but retained for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    Active,
    Deleted,
}

impl RecordStatus {
    pub fn is_active(self) -> bool {
        matches!(self, RecordStatus::Active)
    }
}

/// Job template within a workflow
///
/// The reusable definition of one unit of work. Per-run execution state
/// lives on the WorkflowRun, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub name: String,
    pub component: ComponentType,
    pub parameters: std::collections::HashMap<String, serde_json::Value>,
    pub record_status: RecordStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Job {
    /// Creates an active job with empty parameters
    pub fn new(workflow_id: Uuid, name: impl Into<String>, component: ComponentType) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            name: name.into(),
            component,
            parameters: std::collections::HashMap::new(),
            record_status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}
