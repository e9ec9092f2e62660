//! Failover routing
//!
//! Attempts addresses in declaration order and returns the first one that
//! passes a liveness probe over the trigger transport.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use cascade_core::domain::executor::ExecutorAddress;
use cascade_core::domain::trigger::TriggerParam;

use crate::error::{RouteResult, SchedulerError};
use crate::ports::TriggerTransport;
use crate::route::{ExecutorRouter, ensure_candidates};

/// First-live-address strategy with a fixed preference order
pub struct FailoverRouter {
    transport: Arc<dyn TriggerTransport>,
}

impl FailoverRouter {
    pub fn new(transport: Arc<dyn TriggerTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ExecutorRouter for FailoverRouter {
    async fn route(
        &self,
        trigger: &TriggerParam,
        addresses: &[ExecutorAddress],
    ) -> RouteResult<ExecutorAddress> {
        ensure_candidates(trigger, addresses)?;
        for address in addresses {
            if self.transport.probe(address).await {
                return Ok(address.clone());
            }
            debug!(%address, "Executor failed liveness probe, trying next");
        }
        Err(SchedulerError::routing(format!(
            "no available executor for component type '{}': all {} candidates failed the liveness probe",
            trigger.component,
            addresses.len()
        )))
    }
}
