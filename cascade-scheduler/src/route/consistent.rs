//! Consistent (sticky) routing
//!
//! Derives the index from a stable hash of the job id modulo the candidate
//! count, so repeated triggers of the same job land on the same address
//! while the pool is unchanged. When pool membership changes the mapping
//! may shift for some jobs; that is the accepted tradeoff of this strategy,
//! not a correctness bug.

use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use cascade_core::domain::executor::ExecutorAddress;
use cascade_core::domain::trigger::TriggerParam;

use crate::error::RouteResult;
use crate::route::{ExecutorRouter, ensure_candidates};

/// Sticky selection keyed by job id
pub struct ConsistentHashRouter;

impl ConsistentHashRouter {
    fn bucket(trigger: &TriggerParam, len: usize) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        trigger.job_id.hash(&mut hasher);
        (hasher.finish() as usize) % len
    }
}

#[async_trait]
impl ExecutorRouter for ConsistentHashRouter {
    async fn route(
        &self,
        trigger: &TriggerParam,
        addresses: &[ExecutorAddress],
    ) -> RouteResult<ExecutorAddress> {
        ensure_candidates(trigger, addresses)?;
        let index = Self::bucket(trigger, addresses.len());
        Ok(addresses[index].clone())
    }
}
