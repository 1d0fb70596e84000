use chatrelay::registry::ProviderRegistry;
use chatrelay::relay::RelayPolicy;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProviderRegistry>,
    pub policy: RelayPolicy,
    /// Idle time before a keep-alive comment is written to an open stream.
    pub keep_alive: Duration,
}

impl AppState {
    pub fn new(registry: ProviderRegistry, policy: RelayPolicy, keep_alive: Duration) -> Self {
        Self {
            registry: Arc::new(registry),
            policy,
            keep_alive,
        }
    }
}
