//! Settings of a [`ComponentManager`](crate::ComponentManager).

use serde::Deserialize;
use std::time::Duration;

/// Usually read from the `[manager]` table of a service configuration.
///
/// ```toml
/// [manager]
/// load_timeout_ms = 30000
/// log_dependency_graph = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerSettings {
    /// Upper bound for constructing every component. Unbounded when absent.
    pub load_timeout_ms: Option<u64>,
    /// Log the dependency graph at `info` once all components are constructed.
    pub log_dependency_graph: bool,
}

impl ManagerSettings {
    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }
}
