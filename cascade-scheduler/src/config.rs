//! Scheduler configuration
//!
//! Defines all configurable parameters for the scheduling core including
//! the routing strategy, the retry policy, and the registry refresh cadence.

use std::str::FromStr;
use std::time::Duration;

use cascade_core::domain::workflow::FailurePolicy;

use crate::route::RouteStrategy;

/// Scheduler configuration
///
/// All timeouts and intervals are configurable to allow tuning
/// for different deployment scenarios (dev vs prod, fast vs slow networks).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Strategy used to pick an executor out of a component's pool
    pub route_strategy: RouteStrategy,

    /// Maximum dispatch attempts per job before it is marked failed
    pub max_attempts: u32,

    /// Base delay between dispatch attempts; doubles per attempt
    pub retry_backoff: Duration,

    /// Upper bound on the backoff delay
    pub max_backoff: Duration,

    /// Maximum time to wait for an executor to acknowledge a trigger
    pub trigger_timeout: Duration,

    /// How often the executor registry rebuilds its pools from heartbeats
    pub registry_refresh_interval: Duration,

    /// Failure policy applied when a workflow does not specify its own
    pub default_failure_policy: FailurePolicy,
}

impl SchedulerConfig {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - CASCADE_ROUTE_STRATEGY (default: round_robin)
    /// - CASCADE_MAX_ATTEMPTS (default: 3)
    /// - CASCADE_RETRY_BACKOFF_MS (default: 500)
    /// - CASCADE_MAX_BACKOFF_MS (default: 30000)
    /// - CASCADE_TRIGGER_TIMEOUT_MS (default: 10000)
    /// - CASCADE_REGISTRY_REFRESH_SECS (default: 30)
    pub fn from_env() -> anyhow::Result<Self> {
        let route_strategy = match std::env::var("CASCADE_ROUTE_STRATEGY") {
            Ok(s) => RouteStrategy::from_str(&s)
                .map_err(|_| anyhow::anyhow!("unknown route strategy: {s}"))?,
            Err(_) => RouteStrategy::RoundRobin,
        };

        let max_attempts = std::env::var("CASCADE_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(3);

        let retry_backoff = std::env::var("CASCADE_RETRY_BACKOFF_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(500));

        let max_backoff = std::env::var("CASCADE_MAX_BACKOFF_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(30));

        let trigger_timeout = std::env::var("CASCADE_TRIGGER_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(10));

        let registry_refresh_interval = std::env::var("CASCADE_REGISTRY_REFRESH_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        let config = Self {
            route_strategy,
            max_attempts,
            retry_backoff,
            max_backoff,
            trigger_timeout,
            registry_refresh_interval,
            default_failure_policy: FailurePolicy::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            anyhow::bail!("max_attempts must be greater than 0");
        }

        if self.trigger_timeout.is_zero() {
            anyhow::bail!("trigger_timeout must be greater than 0");
        }

        if self.registry_refresh_interval.is_zero() {
            anyhow::bail!("registry_refresh_interval must be greater than 0");
        }

        if self.max_backoff < self.retry_backoff {
            anyhow::bail!("max_backoff must be at least retry_backoff");
        }

        Ok(())
    }

    /// Delay before the given attempt number (1-based); exponential, capped
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let delay = self.retry_backoff.saturating_mul(1u32 << shift);
        delay.min(self.max_backoff)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            route_strategy: RouteStrategy::RoundRobin,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            trigger_timeout: Duration::from_secs(10),
            registry_refresh_interval: Duration::from_secs(30),
            default_failure_policy: FailurePolicy::default(),
        }
    }
}
