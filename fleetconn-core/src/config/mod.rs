//! Application configuration loaded from the environment
//!
//! Every setting has a default so the service can start with no
//! configuration at all. Invalid numeric values fall back to their
//! defaults rather than aborting startup.

use std::time::Duration;

use thiserror::Error;

/// Default HTTP listen port
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default SSH dial/handshake timeout in seconds
pub const DEFAULT_SSH_TIMEOUT_SECS: u64 = 30;

/// Default SSH keepalive interval in seconds
pub const DEFAULT_SSH_KEEPALIVE_SECS: u64 = 60;

/// Default metric sampling interval in seconds
pub const DEFAULT_METRICS_INTERVAL_SECS: u64 = 10;

/// Default WebSocket ping interval in seconds
pub const DEFAULT_WS_PING_INTERVAL_SECS: u64 = 30;

/// Default WebSocket pong wait (read deadline) in seconds
pub const DEFAULT_WS_PONG_WAIT_SECS: u64 = 60;

/// Development fallback encryption key. Override `ENCRYPTION_KEY` in any
/// real deployment.
const DEV_ENCRYPTION_KEY: &str = "fleetconn-dev-key-0123456789abcd";

/// Errors that can occur while validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The encryption key is not exactly 32 bytes
    #[error("ENCRYPTION_KEY must be exactly 32 bytes, got {0}")]
    InvalidKeyLength(usize),
}

/// Application configuration
///
/// Loaded once at startup via [`AppConfig::from_env`] and shared behind an
/// `Arc` for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen port
    pub server_port: u16,
    /// Database host
    pub db_host: String,
    /// Database port
    pub db_port: u16,
    /// Database user
    pub db_user: String,
    /// Database password
    pub db_password: String,
    /// Database name
    pub db_name: String,
    /// SSH dial and handshake timeout
    pub ssh_timeout: Duration,
    /// SSH transport keepalive interval
    pub ssh_keepalive: Duration,
    /// Metric sampling interval per host
    pub metrics_interval: Duration,
    /// 32-byte key for credential encryption at rest
    pub encryption_key: String,
    /// WebSocket ping interval
    pub ws_ping_interval: Duration,
    /// WebSocket read deadline extension on pong
    pub ws_pong_wait: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_SERVER_PORT,
            db_host: "localhost".to_string(),
            db_port: 3306,
            db_user: "root".to_string(),
            db_password: String::new(),
            db_name: "fleetconn".to_string(),
            ssh_timeout: Duration::from_secs(DEFAULT_SSH_TIMEOUT_SECS),
            ssh_keepalive: Duration::from_secs(DEFAULT_SSH_KEEPALIVE_SECS),
            metrics_interval: Duration::from_secs(DEFAULT_METRICS_INTERVAL_SECS),
            encryption_key: DEV_ENCRYPTION_KEY.to_string(),
            ws_ping_interval: Duration::from_secs(DEFAULT_WS_PING_INTERVAL_SECS),
            ws_pong_wait: Duration::from_secs(DEFAULT_WS_PONG_WAIT_SECS),
        }
    }
}

impl AppConfig {
    /// Creates a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            server_port: env_parsed("SERVER_PORT", defaults.server_port),
            db_host: env_or("DB_HOST", &defaults.db_host),
            db_port: env_parsed("DB_PORT", defaults.db_port),
            db_user: env_or("DB_USER", &defaults.db_user),
            db_password: env_or("DB_PASSWORD", &defaults.db_password),
            db_name: env_or("DB_NAME", &defaults.db_name),
            ssh_timeout: env_secs("SSH_TIMEOUT", DEFAULT_SSH_TIMEOUT_SECS),
            ssh_keepalive: env_secs("SSH_KEEPALIVE", DEFAULT_SSH_KEEPALIVE_SECS),
            metrics_interval: env_secs("METRICS_INTERVAL", DEFAULT_METRICS_INTERVAL_SECS),
            encryption_key: env_or("ENCRYPTION_KEY", &defaults.encryption_key),
            ws_ping_interval: env_secs("WS_PING_INTERVAL", DEFAULT_WS_PING_INTERVAL_SECS),
            ws_pong_wait: env_secs("WS_PONG_WAIT", DEFAULT_WS_PONG_WAIT_SECS),
        }
    }

    /// Validates settings that cannot be defaulted away
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKeyLength`] if the encryption key is
    /// not exactly 32 bytes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let len = self.encryption_key.len();
        if len != 32 {
            return Err(ConfigError::InvalidKeyLength(len));
        }
        Ok(())
    }

    /// Returns the MySQL connection string for the configured database
    #[must_use]
    pub fn database_url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
        )
    }

    /// Sets the metrics interval
    #[must_use]
    pub const fn with_metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = interval;
        self
    }

    /// Sets the SSH timeout
    #[must_use]
    pub const fn with_ssh_timeout(mut self, timeout: Duration) -> Self {
        self.ssh_timeout = timeout;
        self
    }

    /// Sets the encryption key
    #[must_use]
    pub fn with_encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = key.into();
        self
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(env_parsed(key, default_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.db_port, 3306);
        assert_eq!(config.ssh_timeout, Duration::from_secs(30));
        assert_eq!(config.metrics_interval, Duration::from_secs(10));
        assert_eq!(config.ws_ping_interval, Duration::from_secs(30));
        assert_eq!(config.ws_pong_wait, Duration::from_secs(60));
    }

    #[test]
    fn test_default_key_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_key_length() {
        let config = AppConfig::new().with_encryption_key("short");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidKeyLength(5))
        ));
    }

    #[test]
    fn test_database_url() {
        let config = AppConfig::default();
        assert_eq!(
            config.database_url(),
            "mysql://root:@localhost:3306/fleetconn"
        );
    }

    #[test]
    fn test_builders() {
        let config = AppConfig::new()
            .with_metrics_interval(Duration::from_secs(5))
            .with_ssh_timeout(Duration::from_secs(3));
        assert_eq!(config.metrics_interval, Duration::from_secs(5));
        assert_eq!(config.ssh_timeout, Duration::from_secs(3));
    }
}
