//! # Configuration Management
//!
//! Centralized configuration for the MAPI client core.
//!
//! This module provides structured configuration for the client session,
//! the block transport and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! Passwords are never part of the configuration; they travel in
//! [`crate::session::Credentials`] only.

use crate::error::{MapiError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default MAPI port
pub const DEFAULT_PORT: u16 = 50000;

/// Query language sent in every login response
pub const DEFAULT_LANGUAGE: &str = "sql";

/// Max SQL bytes per physical query write
pub const MAX_QUERY_CHUNK: usize = 1020;

/// Max payload bytes in one transport block (15-bit length field, 8 KiB buffers)
pub const MAX_BLOCK_SIZE: usize = 8190;

/// Line terminator on the wire
pub const LINE_TERMINATOR: u8 = b'\n';

/// Longest line the client buffers before giving up on the peer
pub const MAX_LINE_LENGTH: usize = 64 * 1024 * 1024;

/// Default time allowed for the TCP connect
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on every blocking read
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MapiConfig {
    /// Session-specific configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MapiConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| MapiError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| MapiError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| MapiError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("MAPI_HOST") {
            config.client.host = host;
        }

        if let Ok(port) = std::env::var("MAPI_PORT") {
            config.client.port = port
                .parse::<u16>()
                .map_err(|_| MapiError::ConfigError(format!("Invalid MAPI_PORT: {port}")))?;
        }

        if let Ok(database) = std::env::var("MAPI_DATABASE") {
            config.client.database = database;
        }

        if let Ok(user) = std::env::var("MAPI_USER") {
            config.client.username = user;
        }

        if let Ok(timeout) = std::env::var("MAPI_CONNECT_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.client.connect_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(timeout) = std::env::var("MAPI_RECEIVE_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.client.receive_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(algo) = std::env::var("MAPI_HASH_ALGORITHM") {
            config.client.hash_algorithm = Some(algo);
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
            .map_err(|e| MapiError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| MapiError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.client.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MapiError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Session-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Server host name or address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Database to log in to
    pub database: String,

    /// Login user name
    pub username: String,

    /// Explicit hash algorithm for the login response; `None` lets the
    /// protocol handler pick from what the server advertises
    #[serde(default)]
    pub hash_algorithm: Option<String>,

    /// Timeout for the TCP connect
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Timeout for every individual read
    #[serde(with = "duration_serde")]
    pub receive_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: DEFAULT_PORT,
            database: String::from("demo"),
            username: String::from("monetdb"),
            hash_algorithm: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.host.is_empty() {
            errors.push("Client host cannot be empty".to_string());
        }

        if self.port == 0 {
            errors.push("Client port must be greater than 0".to_string());
        }

        if self.database.is_empty() {
            errors.push("Database name cannot be empty".to_string());
        } else if self.database.contains(':') {
            errors.push(format!(
                "Database name '{}' cannot contain ':' (challenge field separator)",
                self.database
            ));
        }

        if self.username.contains(':') {
            errors.push(format!(
                "Username '{}' cannot contain ':' (challenge field separator)",
                self.username
            ));
        }

        if let Some(ref algo) = self.hash_algorithm {
            let plain = algo.eq_ignore_ascii_case(crate::protocol::handler::PLAIN_ALGORITHM);
            if !plain && crate::protocol::hash::HashAlgorithm::from_name(algo).is_none() {
                errors.push(format!("Unknown hash algorithm: '{algo}'"));
            }
        }

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connect timeout too short (minimum: 100ms)".to_string());
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push("Connect timeout too long (maximum: 300s)".to_string());
        }

        if self.receive_timeout.as_millis() < 100 {
            errors.push("Receive timeout too short (minimum: 100ms)".to_string());
        }

        errors
    }
}

/// Transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Max SQL bytes per physical query write
    pub query_chunk_size: usize,

    /// Max payload bytes per outbound block
    pub max_block_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            query_chunk_size: MAX_QUERY_CHUNK,
            max_block_size: MAX_BLOCK_SIZE,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_block_size == 0 {
            errors.push("Max block size cannot be 0".to_string());
        } else if self.max_block_size > MAX_BLOCK_SIZE {
            errors.push(format!(
                "Max block size too large: {} bytes (maximum: {MAX_BLOCK_SIZE})",
                self.max_block_size
            ));
        }

        if self.query_chunk_size == 0 {
            errors.push("Query chunk size cannot be 0".to_string());
        } else if self.query_chunk_size > MAX_QUERY_CHUNK {
            errors.push(format!(
                "Query chunk size too large: {} bytes (maximum: {MAX_QUERY_CHUNK})",
                self.query_chunk_size
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level, overridden by `RUST_LOG` when set
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,

    /// Whether to include the event target in each line
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("mapi-protocol"),
            log_level: Level::INFO,
            json_format: false,
            with_target: true,
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
        level.as_str().to_ascii_lowercase().serialize(serializer)
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
