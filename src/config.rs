//! # Configuration Management
//!
//! Centralized configuration for sessions, the login exchange and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! Durations are serialized as milliseconds and log levels as lowercase strings.

use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Port of the authentication service
pub const AUTH_PORT: u16 = 47611;

/// Authentication endpoints tried in order
pub const AUTH_ENDPOINTS: [&str; 5] = [
    "208.85.110.164",
    "208.85.110.166",
    "208.85.110.169",
    "208.85.110.170",
    "208.85.110.171",
];

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Game session configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Login exchange configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("MAPLE_SESSION_ADDRESS") {
            config.client.address = addr;
        }

        if let Ok(timeout) = std::env::var("MAPLE_SESSION_CONNECTION_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.client.connection_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(timeout) = std::env::var("MAPLE_SESSION_RECONNECT_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.client.reconnect_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(endpoints) = std::env::var("MAPLE_SESSION_AUTH_ENDPOINTS") {
            config.auth.endpoints = endpoints
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Ok(port) = std::env::var("MAPLE_SESSION_AUTH_PORT") {
            if let Ok(val) = port.parse::<u16>() {
                config.auth.port = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.client.validate());
        errors.extend(self.auth.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Game session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Game server address (e.g., "127.0.0.1:20001")
    pub address: String,

    /// Timeout for the initial connection
    #[serde(with = "duration_serde")]
    pub connection_timeout: Duration,

    /// Timeout for a reconnect to the same endpoint
    #[serde(with = "duration_serde")]
    pub reconnect_timeout: Duration,

    /// Initial size of the receive buffer, and the size of each socket read
    pub receive_buffer_size: usize,

    /// Connect attempts per pre-handshake connection failure; 0 disables the retry
    pub max_reconnect_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:20001"),
            connection_timeout: timeout::DEFAULT_TIMEOUT,
            reconnect_timeout: timeout::RECONNECT_TIMEOUT,
            receive_buffer_size: crate::core::buffer::RECEIVE_SIZE,
            max_reconnect_attempts: 1,
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Client address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid client address format: '{}' (expected format: '10.0.0.1:20001')",
                self.address
            ));
        }

        if self.connection_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        } else if self.connection_timeout.as_secs() > 300 {
            errors.push("Connection timeout too long (maximum: 300s)".to_string());
        }

        if self.reconnect_timeout.as_millis() < 100 {
            errors.push("Reconnect timeout too short (minimum: 100ms)".to_string());
        } else if self.reconnect_timeout.as_secs() > 300 {
            errors.push("Reconnect timeout too long (maximum: 300s)".to_string());
        }

        if self.receive_buffer_size < 16 {
            errors.push("Receive buffer size too small (minimum: 16 bytes)".to_string());
        } else if self.receive_buffer_size > 16 * 1024 * 1024 {
            errors.push(format!(
                "Receive buffer size too large: {} bytes (maximum: 16 MB)",
                self.receive_buffer_size
            ));
        }

        if self.max_reconnect_attempts > 10 {
            errors.push(format!(
                "Max reconnect attempts too high: {} (maximum: 10)",
                self.max_reconnect_attempts
            ));
        }

        errors
    }
}

/// Login exchange configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Authentication service hosts, tried in order
    pub endpoints: Vec<String>,

    /// Authentication service port
    pub port: u16,

    /// Timeout for each step (connect, send and receive)
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            endpoints: AUTH_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            port: AUTH_PORT,
            timeout: timeout::AUTH_TIMEOUT,
        }
    }
}

impl AuthConfig {
    /// Validate authentication configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.endpoints.is_empty() {
            errors.push("At least one authentication endpoint is required".to_string());
        }
        for endpoint in &self.endpoints {
            if endpoint.parse::<std::net::IpAddr>().is_err() {
                errors.push(format!("Invalid authentication endpoint: '{endpoint}'"));
            }
        }

        if self.port == 0 {
            errors.push("Authentication port cannot be 0".to_string());
        }

        if self.timeout.as_millis() < 100 {
            errors.push("Authentication timeout too short (minimum: 100ms)".to_string());
        }

        errors
    }

    /// Socket addresses of all configured endpoints
    pub fn socket_addrs(&self) -> Result<Vec<std::net::SocketAddr>> {
        self.endpoints
            .iter()
            .map(|host| {
                host.parse::<std::net::IpAddr>()
                    .map(|ip| std::net::SocketAddr::new(ip, self.port))
                    .map_err(|_| {
                        ProtocolError::ConfigError(format!(
                            "Invalid authentication endpoint: '{host}'"
                        ))
                    })
            })
            .collect()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("maple-session"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        level.as_str().to_lowercase().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
