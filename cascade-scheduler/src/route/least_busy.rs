//! Least-busy routing
//!
//! Reads an externally supplied in-flight count per address and picks the
//! minimum; ties go to the earliest address in declaration order.

use std::sync::Arc;

use async_trait::async_trait;

use cascade_core::domain::executor::ExecutorAddress;
use cascade_core::domain::trigger::TriggerParam;

use crate::error::RouteResult;
use crate::ports::ExecutorLoadSource;
use crate::route::{ExecutorRouter, ensure_candidates};

/// Minimum-load strategy backed by an external load signal
pub struct LeastBusyRouter {
    load_source: Arc<dyn ExecutorLoadSource>,
}

impl LeastBusyRouter {
    pub fn new(load_source: Arc<dyn ExecutorLoadSource>) -> Self {
        Self { load_source }
    }
}

#[async_trait]
impl ExecutorRouter for LeastBusyRouter {
    async fn route(
        &self,
        trigger: &TriggerParam,
        addresses: &[ExecutorAddress],
    ) -> RouteResult<ExecutorAddress> {
        ensure_candidates(trigger, addresses)?;

        let mut best = &addresses[0];
        let mut best_load = self.load_source.inflight(best);
        for address in &addresses[1..] {
            let load = self.load_source.inflight(address);
            // Strict comparison keeps the earliest address on ties
            if load < best_load {
                best = address;
                best_load = load;
            }
        }
        Ok(best.clone())
    }
}
