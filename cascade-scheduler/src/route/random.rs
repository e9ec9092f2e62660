//! Random routing

use async_trait::async_trait;
use rand::Rng;

use cascade_core::domain::executor::ExecutorAddress;
use cascade_core::domain::trigger::TriggerParam;

use crate::error::RouteResult;
use crate::route::{ExecutorRouter, ensure_candidates};

/// Uniform selection over the candidate list; no shared mutable state
pub struct RandomRouter;

#[async_trait]
impl ExecutorRouter for RandomRouter {
    async fn route(
        &self,
        trigger: &TriggerParam,
        addresses: &[ExecutorAddress],
    ) -> RouteResult<ExecutorAddress> {
        ensure_candidates(trigger, addresses)?;
        let index = rand::thread_rng().gen_range(0..addresses.len());
        Ok(addresses[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::test_support::trigger;

    #[tokio::test]
    async fn test_empty_pool_fails() {
        let err = RandomRouter.route(&trigger(), &[]).await.unwrap_err();
        assert!(err.to_string().contains("no available executor"));
    }

    #[tokio::test]
    async fn test_selection_stays_in_pool() {
        let addresses = vec![
            ExecutorAddress::new("a", 1),
            ExecutorAddress::new("b", 2),
            ExecutorAddress::new("c", 3),
        ];
        for _ in 0..50 {
            let got = RandomRouter.route(&trigger(), &addresses).await.unwrap();
            assert!(addresses.contains(&got));
        }
    }

    #[tokio::test]
    async fn test_single_candidate_always_selected() {
        let addresses = vec![ExecutorAddress::new("only", 1)];
        for _ in 0..10 {
            let got = RandomRouter.route(&trigger(), &addresses).await.unwrap();
            assert_eq!(got, addresses[0]);
        }
    }
}
