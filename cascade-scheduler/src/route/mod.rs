//! Executor routing
//!
//! Given a trigger and the current candidate address list for its component
//! type, a router deterministically selects exactly one address or fails.
//! Strategies are selected by configuration and share one contract: an
//! empty candidate list is always a distinguishable "no available executor"
//! failure, never a panic and never a silent no-op.

pub mod consistent;
pub mod failover;
pub mod least_busy;
pub mod random;
pub mod round_robin;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cascade_core::domain::executor::ExecutorAddress;
use cascade_core::domain::trigger::TriggerParam;

use crate::error::{RouteResult, SchedulerError};
use crate::ports::{ExecutorLoadSource, TriggerTransport};

pub use consistent::ConsistentHashRouter;
pub use failover::FailoverRouter;
pub use least_busy::LeastBusyRouter;
pub use random::RandomRouter;
pub use round_robin::RoundRobinRouter;

/// Address selection capability
#[async_trait]
pub trait ExecutorRouter: Send + Sync {
    /// Selects one address from the candidate list for this trigger
    async fn route(
        &self,
        trigger: &TriggerParam,
        addresses: &[ExecutorAddress],
    ) -> RouteResult<ExecutorAddress>;
}

/// Available routing strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStrategy {
    RoundRobin,
    Random,
    ConsistentHash,
    Failover,
    LeastBusy,
}

impl std::str::FromStr for RouteStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" => Ok(Self::RoundRobin),
            "random" => Ok(Self::Random),
            "consistent_hash" => Ok(Self::ConsistentHash),
            "failover" => Ok(Self::Failover),
            "least_busy" => Ok(Self::LeastBusy),
            other => Err(format!("unknown route strategy: {other}")),
        }
    }
}

/// Builds the configured router.
///
/// Failover probes liveness through the trigger transport; least-busy needs
/// an external load signal and is rejected when none is wired up.
pub fn build_router(
    strategy: RouteStrategy,
    transport: Arc<dyn TriggerTransport>,
    load_source: Option<Arc<dyn ExecutorLoadSource>>,
) -> RouteResult<Arc<dyn ExecutorRouter>> {
    match strategy {
        RouteStrategy::RoundRobin => Ok(Arc::new(RoundRobinRouter::new())),
        RouteStrategy::Random => Ok(Arc::new(RandomRouter)),
        RouteStrategy::ConsistentHash => Ok(Arc::new(ConsistentHashRouter)),
        RouteStrategy::Failover => Ok(Arc::new(FailoverRouter::new(transport))),
        RouteStrategy::LeastBusy => {
            let load_source = load_source.ok_or_else(|| {
                SchedulerError::routing("least-busy strategy requires an executor load source")
            })?;
            Ok(Arc::new(LeastBusyRouter::new(load_source)))
        }
    }
}

/// Shared empty-pool precondition for every strategy
pub(crate) fn ensure_candidates(
    trigger: &TriggerParam,
    addresses: &[ExecutorAddress],
) -> RouteResult<()> {
    if addresses.is_empty() {
        return Err(SchedulerError::no_available_executor(&trigger.component));
    }
    Ok(())
}
