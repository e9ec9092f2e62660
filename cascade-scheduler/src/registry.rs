//! Executor registry
//!
//! Tracks the live address pool per component type, refreshed from an
//! external heartbeat collaborator. Pools are swapped atomically as whole
//! snapshots (copy-on-write), so a router invocation always sees a
//! self-consistent list and never a half-updated one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tracing::{debug, warn};

use cascade_core::domain::executor::ExecutorAddress;
use cascade_core::domain::job::ComponentType;

use crate::ports::ExecutorHeartbeatSource;

type Pools = HashMap<ComponentType, Arc<Vec<ExecutorAddress>>>;

/// Snapshot-consistent address pools per component type
pub struct ExecutorRegistry {
    pools: ArcSwap<Pools>,
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            pools: ArcSwap::from_pointee(Pools::new()),
        }
    }

    /// Current candidate list for a component type.
    ///
    /// Returns the snapshot the registry held at call time; membership
    /// changes after this call do not affect the returned list.
    pub fn addresses(&self, component: &ComponentType) -> Option<Arc<Vec<ExecutorAddress>>> {
        self.pools.load().get(component).cloned()
    }

    /// Component types with at least one registered address
    pub fn component_types(&self) -> Vec<ComponentType> {
        self.pools.load().keys().cloned().collect()
    }

    /// Replaces all pools in one atomic swap
    pub fn replace_pools(&self, pools: HashMap<ComponentType, Vec<ExecutorAddress>>) {
        let snapshot: Pools = pools
            .into_iter()
            .filter(|(_, addresses)| !addresses.is_empty())
            .map(|(component, addresses)| (component, Arc::new(addresses)))
            .collect();
        debug!(components = snapshot.len(), "Executor pools refreshed");
        self.pools.store(Arc::new(snapshot));
    }

    /// Pulls the current pools from the heartbeat source
    pub async fn refresh(&self, source: &dyn ExecutorHeartbeatSource) -> anyhow::Result<()> {
        let pools = source.current_pools().await?;
        self.replace_pools(pools);
        Ok(())
    }

    /// Starts a background task refreshing the pools on an interval
    pub fn start_refresh_task(
        self: &Arc<Self>,
        source: Arc<dyn ExecutorHeartbeatSource>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;

                if let Err(e) = registry.refresh(source.as_ref()).await {
                    warn!("Failed to refresh executor pools: {:#}", e);
                }
            }
        })
    }
}
