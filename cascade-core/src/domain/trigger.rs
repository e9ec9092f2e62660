//! Trigger payloads crossing the transport boundary

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::ComponentType;

/// Payload sent to an executor for one job invocation
///
/// Immutable once constructed; each retry attempt builds a fresh param with
/// the attempt number bumped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerParam {
    pub job_id: Uuid,
    pub run_id: Uuid,
    pub workflow_id: Uuid,
    pub component: ComponentType,
    pub attempt: u32,
    /// Job parameters serialized for the wire; the executor interprets them
    /// according to the component type.
    pub parameters: serde_json::Value,
}

/// Immediate executor acknowledgement of a trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerAck {
    /// The executor accepted the job and will report completion later
    /// through the run-completion callback path.
    Queued,
    /// Synchronous-result component types complete in-band.
    Completed {
        success: bool,
        message: Option<String>,
    },
}
