//! Round-robin routing
//!
//! One cursor per component type, shared across all concurrent triggers for
//! that type. The cursor is advanced with an atomic fetch-add so two racing
//! triggers can never observe the same index; the value wraps naturally and
//! is reduced modulo the candidate count at selection time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use cascade_core::domain::executor::ExecutorAddress;
use cascade_core::domain::job::ComponentType;
use cascade_core::domain::trigger::TriggerParam;

use crate::error::RouteResult;
use crate::route::{ExecutorRouter, ensure_candidates};

/// Round-robin strategy with a process-local cursor per component type
pub struct RoundRobinRouter {
    cursors: RwLock<HashMap<ComponentType, Arc<AtomicU64>>>,
}

impl Default for RoundRobinRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundRobinRouter {
    pub fn new() -> Self {
        Self {
            cursors: RwLock::new(HashMap::new()),
        }
    }

    fn cursor(&self, component: &ComponentType) -> Arc<AtomicU64> {
        if let Some(cursor) = self
            .cursors
            .read()
            .expect("cursor lock poisoned")
            .get(component)
        {
            return Arc::clone(cursor);
        }
        let mut cursors = self.cursors.write().expect("cursor lock poisoned");
        Arc::clone(cursors.entry(component.clone()).or_default())
    }
}

#[async_trait]
impl ExecutorRouter for RoundRobinRouter {
    async fn route(
        &self,
        trigger: &TriggerParam,
        addresses: &[ExecutorAddress],
    ) -> RouteResult<ExecutorAddress> {
        ensure_candidates(trigger, addresses)?;
        let cursor = self.cursor(&trigger.component);
        let index = cursor.fetch_add(1, Ordering::Relaxed) as usize % addresses.len();
        Ok(addresses[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::test_support::trigger;

    fn pool(n: u16) -> Vec<ExecutorAddress> {
        (0..n).map(|i| ExecutorAddress::new("executor", 9000 + i)).collect()
    }

    #[tokio::test]
    async fn test_empty_pool_fails() {
        let router = RoundRobinRouter::new();
        let err = router.route(&trigger(), &[]).await.unwrap_err();
        assert!(err.to_string().contains("no available executor"));
    }

    #[tokio::test]
    async fn test_cycles_through_pool_in_order() {
        let router = RoundRobinRouter::new();
        let addresses = pool(3);
        let t = trigger();
        for round in 0..2 {
            for expected in &addresses {
                let got = router.route(&t, &addresses).await.unwrap();
                assert_eq!(&got, expected, "round {round}");
            }
        }
    }

    #[tokio::test]
    async fn test_cursors_are_per_component_type() {
        let router = RoundRobinRouter::new();
        let addresses = pool(2);
        let mut shell = trigger();
        shell.component = "shell".into();
        let mut sql = trigger();
        sql.component = "sql".into();

        assert_eq!(router.route(&shell, &addresses).await.unwrap(), addresses[0]);
        // A different component type starts from its own cursor
        assert_eq!(router.route(&sql, &addresses).await.unwrap(), addresses[0]);
        assert_eq!(router.route(&shell, &addresses).await.unwrap(), addresses[1]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_lost_or_duplicated_increments_under_concurrency() {
        let router = Arc::new(RoundRobinRouter::new());
        let addresses = Arc::new(pool(8));
        let t = Arc::new(trigger());

        // 2N concurrent routes over N addresses must select each exactly twice
        let mut handles = Vec::new();
        for _ in 0..addresses.len() * 2 {
            let router = Arc::clone(&router);
            let addresses = Arc::clone(&addresses);
            let t = Arc::clone(&t);
            handles.push(tokio::spawn(async move {
                router.route(&t, &addresses).await.unwrap()
            }));
        }

        let mut counts: HashMap<ExecutorAddress, usize> = HashMap::new();
        for handle in handles {
            *counts.entry(handle.await.unwrap()).or_default() += 1;
        }

        assert_eq!(counts.len(), addresses.len());
        for (address, count) in counts {
            assert_eq!(count, 2, "{address} selected {count} times");
        }
    }
}
