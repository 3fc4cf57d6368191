//! Tunables for the relay core.

use std::time::Duration;

/// Default idle window before an unpolled connection is dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for a [`ConnectionRegistry`](super::ConnectionRegistry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// How long a connection may go without a poll before it is disconnected.
    pub idle_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl RelayConfig {
    /// Create config with a custom idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}
