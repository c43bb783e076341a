//! Server configuration module
//! Reads the hub's limits and the service shell's settings from the environment

use crate::constants::{
    DEFAULT_COMMAND_QUEUE_CAPACITY, DEFAULT_HOST, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PONG_WAIT_SECS,
    DEFAULT_PORT, DEFAULT_REGISTER_QUEUE_CAPACITY, DEFAULT_SEND_QUEUE_CAPACITY,
    DEFAULT_WRITE_WAIT_SECS,
};
use crate::core::client::ClientConfig;
use crate::core::hub::HubConfig;
use crate::error::{ChatHubError, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// JWT secret for token validation at the admission boundary
    pub jwt_secret: String,
    /// Idle time after which a silent peer is dropped
    pub pong_wait: Duration,
    /// Deadline for a single write to a peer
    pub write_wait: Duration,
    /// Largest inbound frame accepted, in bytes
    pub max_message_size: usize,
    /// Outbound frames buffered per client
    pub send_queue_capacity: usize,
    /// Pending admissions before new connections are rejected
    pub register_queue_capacity: usize,
    /// Pending hub commands before senders wait
    pub command_queue_capacity: usize,
    /// Enable TLS
    pub enable_tls: bool,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

impl ServerConfig {
    /// Default configuration around the given secret
    pub fn with_secret(jwt_secret: impl Into<String>) -> Result<Self> {
        let jwt_secret = jwt_secret.into();
        Self::validate_jwt_secret(&jwt_secret)?;

        Ok(Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            jwt_secret,
            pong_wait: Duration::from_secs(DEFAULT_PONG_WAIT_SECS),
            write_wait: Duration::from_secs(DEFAULT_WRITE_WAIT_SECS),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
            register_queue_capacity: DEFAULT_REGISTER_QUEUE_CAPACITY,
            command_queue_capacity: DEFAULT_COMMAND_QUEUE_CAPACITY,
            enable_tls: false,
            tls_cert_path: None,
            tls_key_path: None,
        })
    }

    /// Validate that the JWT secret meets security requirements
    fn validate_jwt_secret(secret: &str) -> Result<()> {
        if secret.len() < 32 {
            return Err(ChatHubError::ConfigError(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        // Check for insecure default or example values
        let insecure_patterns = ["your-secret-key", "change-this", "changeme", "password", "12345"];
        for pattern in &insecure_patterns {
            if secret.contains(pattern) {
                return Err(ChatHubError::ConfigError(format!(
                    "JWT secret contains insecure pattern '{}'. Generate one with: openssl rand -base64 32",
                    pattern
                )));
            }
        }

        if secret.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ChatHubError::ConfigError(
                "JWT secret should contain mixed characters (letters, numbers, symbols)".to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let jwt_secret = env::var("CHAT_HUB_JWT_SECRET")
            .or_else(|_| env::var("JWT_SECRET"))
            .map_err(|_| {
                ChatHubError::ConfigError(
                    "CHAT_HUB_JWT_SECRET environment variable is required. \
                     Generate one with: openssl rand -base64 32"
                        .to_string(),
                )
            })?;

        let mut config = Self::with_secret(jwt_secret)?;

        config.host = env::var("CHAT_HUB_HOST").unwrap_or(config.host);
        config.port = env_or("CHAT_HUB_PORT", config.port);
        config.pong_wait = Duration::from_secs(env_or("CHAT_HUB_PONG_WAIT_SECS", DEFAULT_PONG_WAIT_SECS));
        config.write_wait =
            Duration::from_secs(env_or("CHAT_HUB_WRITE_WAIT_SECS", DEFAULT_WRITE_WAIT_SECS));
        config.max_message_size = env_or("CHAT_HUB_MAX_MESSAGE_SIZE", config.max_message_size);
        config.send_queue_capacity = env_or("CHAT_HUB_SEND_QUEUE", config.send_queue_capacity);
        config.register_queue_capacity =
            env_or("CHAT_HUB_REGISTER_QUEUE", config.register_queue_capacity);
        config.command_queue_capacity =
            env_or("CHAT_HUB_COMMAND_QUEUE", config.command_queue_capacity);

        // TLS configuration
        config.enable_tls = env::var("CHAT_HUB_ENABLE_TLS")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);
        config.tls_cert_path = env::var("CHAT_HUB_TLS_CERT_PATH").ok();
        config.tls_key_path = env::var("CHAT_HUB_TLS_KEY_PATH").ok();

        config.validate()?;
        Ok(config)
    }

    /// Check limits and TLS settings for consistency
    pub fn validate(&self) -> Result<()> {
        if self.pong_wait.is_zero() || self.write_wait.is_zero() {
            return Err(ChatHubError::ConfigError(
                "Connection timeouts must be greater than zero".to_string(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(ChatHubError::ConfigError(
                "Maximum message size must be greater than zero".to_string(),
            ));
        }
        if self.send_queue_capacity == 0
            || self.register_queue_capacity == 0
            || self.command_queue_capacity == 0
        {
            return Err(ChatHubError::ConfigError(
                "Queue capacities must be greater than zero".to_string(),
            ));
        }

        if self.enable_tls {
            let (Some(cert_path), Some(key_path)) = (&self.tls_cert_path, &self.tls_key_path) else {
                return Err(ChatHubError::ConfigError(
                    "TLS is enabled but CHAT_HUB_TLS_CERT_PATH or CHAT_HUB_TLS_KEY_PATH is not set"
                        .to_string(),
                ));
            };
            if !std::path::Path::new(cert_path).exists() {
                return Err(ChatHubError::ConfigError(format!(
                    "TLS certificate file does not exist: {}",
                    cert_path
                )));
            }
            if !std::path::Path::new(key_path).exists() {
                return Err(ChatHubError::ConfigError(format!(
                    "TLS private key file does not exist: {}",
                    key_path
                )));
            }
        }

        Ok(())
    }

    /// Queue capacities for the hub coordinator
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            register_queue_capacity: self.register_queue_capacity,
            command_queue_capacity: self.command_queue_capacity,
            send_queue_capacity: self.send_queue_capacity,
        }
    }

    /// Timing and size limits for each connection
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.pong_wait, self.write_wait, self.max_message_size)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "hub-test-signing-key-9f8e7d6c5b4a3210xyz";

    #[test]
    fn test_short_secret_is_rejected() {
        let result = ServerConfig::with_secret("short-1");
        assert!(result.unwrap_err().to_string().contains("32 characters"));
    }

    #[test]
    fn test_placeholder_secret_is_rejected() {
        assert!(ServerConfig::with_secret("your-secret-key-0123456789abcdefghij").is_err());
        assert!(ServerConfig::with_secret("abcdefghijabcdefghijabcdefghijabcdef").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::with_secret(SECRET).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.send_queue_capacity, 256);
        assert!(config.validate().is_ok());

        let client = config.client_config();
        assert_eq!(client.ping_period, Duration::from_secs(54));
        assert_eq!(client.max_message_size, 512);

        let hub = config.hub_config();
        assert_eq!(hub.send_queue_capacity, 256);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let mut config = ServerConfig::with_secret(SECRET).unwrap();
        config.send_queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tls_requires_paths() {
        let mut config = ServerConfig::with_secret(SECRET).unwrap();
        config.enable_tls = true;
        assert!(config.validate().is_err());
    }
}
