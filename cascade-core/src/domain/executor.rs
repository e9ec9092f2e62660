//! Executor address types

use serde::{Deserialize, Serialize};

/// A reachable executor endpoint, registered per component type.
///
/// Never owned by a single job; shared across all jobs of the component
/// type it is registered for. Pool membership changes over time via the
/// executor registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutorAddress {
    pub host: String,
    pub port: u16,
}

impl ExecutorAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parses a "host:port" string
    pub fn parse(s: &str) -> Option<Self> {
        let (host, port) = s.rsplit_once(':')?;
        if host.is_empty() {
            return None;
        }
        let port = port.parse().ok()?;
        Some(Self::new(host, port))
    }
}

impl std::fmt::Display for ExecutorAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
