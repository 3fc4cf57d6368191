//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `LONGPOLL_RELAY` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use longpoll_relay::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Idle timeout: {:?}", config.relay.idle_timeout());
//! ```

mod error;
mod relay;
mod server;

pub use error::{ConfigError, ValidationError};
pub use relay::RelaySettings;
pub use server::ServerConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a runnable
/// development configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (bind address, logging, HTTP limits)
    #[serde(default)]
    pub server: ServerConfig,

    /// Relay configuration (idle timeout, poll route)
    #[serde(default)]
    pub relay: RelaySettings,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `LONGPOLL_RELAY` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `LONGPOLL_RELAY__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `LONGPOLL_RELAY__RELAY__IDLE_TIMEOUT_SECS=30` -> `relay.idle_timeout_secs = 30`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("LONGPOLL_RELAY")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.relay.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use std::time::Duration;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to clear environment variables after testing
    fn clear_env() {
        env::remove_var("LONGPOLL_RELAY__SERVER__PORT");
        env::remove_var("LONGPOLL_RELAY__SERVER__JSON_LOGS");
        env::remove_var("LONGPOLL_RELAY__RELAY__IDLE_TIMEOUT_SECS");
        env::remove_var("LONGPOLL_RELAY__RELAY__POLL_PATH");
    }

    #[test]
    fn test_load_defaults_from_empty_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.relay.idle_timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_custom_idle_timeout() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("LONGPOLL_RELAY__RELAY__IDLE_TIMEOUT_SECS", "5");
        env::set_var("LONGPOLL_RELAY__RELAY__POLL_PATH", "/rt/poll");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.relay.idle_timeout(), Duration::from_secs(5));
        assert_eq!(config.relay.poll_path, "/rt/poll");
    }

    #[test]
    fn test_custom_server_port() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("LONGPOLL_RELAY__SERVER__PORT", "3000");
        env::set_var("LONGPOLL_RELAY__SERVER__JSON_LOGS", "true");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.server.json_logs);
    }

    #[test]
    fn test_validate_rejects_zero_idle_timeout() {
        let mut config = AppConfig::default();
        config.relay.idle_timeout_secs = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidIdleTimeout));
    }
}
