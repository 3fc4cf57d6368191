//! Relay configuration

use serde::Deserialize;
use std::time::Duration;

use crate::domain::relay::RelayConfig;

use super::error::ValidationError;

/// Relay engine and poll endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    /// Seconds without a poll before a connection is dropped
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Route the poll endpoint is mounted at
    #[serde(default = "default_poll_path")]
    pub poll_path: String,
}

impl RelaySettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Core engine configuration derived from these settings
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig::default().with_idle_timeout(self.idle_timeout())
    }

    /// Validate relay configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.idle_timeout_secs == 0 {
            return Err(ValidationError::InvalidIdleTimeout);
        }
        if !self.poll_path.starts_with('/') {
            return Err(ValidationError::InvalidPollPath);
        }
        Ok(())
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            poll_path: default_poll_path(),
        }
    }
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_poll_path() -> String {
    "/socket".to_string()
}
