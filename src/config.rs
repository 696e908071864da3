//! # Configuration Management
//!
//! Centralized configuration for the datagram protocol library.
//!
//! This module provides structured configuration for server and client engines,
//! the UDP transport underneath them, and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! ## Shutdown Latency
//! The receive loop polls the socket for at most `poll_interval` before it
//! re-checks its stop flag, so `poll_interval` bounds how long `stop()` blocks.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Current supported protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Magic number identifying protocol frames
pub const MAGIC: u32 = 0xABCD_1234;

/// Size of the fixed frame header in bytes
pub const HEADER_SIZE: usize = 20;

/// Nominal datagram budget (one Ethernet MTU)
pub const MAX_DATAGRAM_SIZE: usize = 1500;

/// Largest payload that fits a single UDP/IPv4 datagram together with the header
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Default receive poll window
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default server port
pub const DEFAULT_PORT: u16 = 9000;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client-specific configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

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

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("DATAGRAM_PROTOCOL_BIND_ADDRESS") {
            config.server.bind_address = addr.parse().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid DATAGRAM_PROTOCOL_BIND_ADDRESS: {e}"))
            })?;
        }

        if let Ok(port) = std::env::var("DATAGRAM_PROTOCOL_SERVER_PORT") {
            config.server.port = port.parse().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid DATAGRAM_PROTOCOL_SERVER_PORT: {e}"))
            })?;
        }

        if let Ok(addr) = std::env::var("DATAGRAM_PROTOCOL_CLIENT_ADDRESS") {
            config.client.address = addr;
        }

        if let Ok(poll) = std::env::var("DATAGRAM_PROTOCOL_POLL_INTERVAL_MS") {
            if let Ok(val) = poll.parse::<u64>() {
                config.transport.poll_interval = Duration::from_millis(val);
            }
        }

        if let Ok(size) = std::env::var("DATAGRAM_PROTOCOL_RECV_BUFFER_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.transport.recv_buffer_size = val;
            }
        }

        if let Ok(level) = std::env::var("DATAGRAM_PROTOCOL_LOG_LEVEL") {
            if let Ok(val) = level.parse::<Level>() {
                config.logging.log_level = val;
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
        errors.extend(self.server.validate());
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
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Local address the listening socket binds to
    pub bind_address: IpAddr,

    /// Listening port; 0 asks the OS for an ephemeral port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// Full socket address the server binds
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.bind_address.is_multicast() {
            errors.push(format!(
                "Bind address cannot be a multicast address: {}",
                self.bind_address
            ));
        }

        errors
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Target server address ("ip:port")
    pub address: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{DEFAULT_PORT}"),
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Client address cannot be empty".to_string());
        } else {
            match self.address.parse::<SocketAddr>() {
                Ok(addr) if addr.port() == 0 => {
                    errors.push("Client target port cannot be 0".to_string());
                }
                Ok(_) => {}
                Err(_) => errors.push(format!(
                    "Invalid client address format: '{}' (expected format: '127.0.0.1:9000')",
                    self.address
                )),
            }
        }

        errors
    }
}

/// Transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Upper bound of a single receive poll; also bounds `stop()` latency
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,

    /// Size of the buffer each datagram is received into
    pub recv_buffer_size: usize,

    /// Largest payload `send_packet` accepts
    pub max_payload_size: usize,

    /// SO_RCVBUF override
    pub socket_recv_buffer_size: Option<usize>,

    /// SO_SNDBUF override
    pub socket_send_buffer_size: Option<usize>,

    /// IP time-to-live override
    pub ttl: Option<u32>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            recv_buffer_size: MAX_DATAGRAM_SIZE,
            max_payload_size: MAX_DATAGRAM_SIZE - HEADER_SIZE,
            socket_recv_buffer_size: None,
            socket_send_buffer_size: None,
            ttl: None,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.poll_interval.is_zero() {
            errors.push("Poll interval cannot be 0".to_string());
        } else if self.poll_interval > Duration::from_secs(1) {
            errors.push("Poll interval too long (maximum: 1s)".to_string());
        }

        if self.recv_buffer_size < HEADER_SIZE {
            errors.push(format!(
                "Receive buffer too small: {} bytes (minimum: {HEADER_SIZE})",
                self.recv_buffer_size
            ));
        } else if self.recv_buffer_size > HEADER_SIZE + MAX_UDP_PAYLOAD {
            errors.push(format!(
                "Receive buffer too large: {} bytes (maximum: {})",
                self.recv_buffer_size,
                HEADER_SIZE + MAX_UDP_PAYLOAD
            ));
        }

        if self.max_payload_size + HEADER_SIZE > MAX_UDP_PAYLOAD {
            errors.push(format!(
                "Max payload size too large: {} bytes (maximum: {})",
                self.max_payload_size,
                MAX_UDP_PAYLOAD - HEADER_SIZE
            ));
        }

        if self.max_payload_size + HEADER_SIZE > self.recv_buffer_size {
            errors.push(
                "Max payload size plus header exceeds receive buffer size".to_string(),
            );
        }

        if let Some(0) = self.socket_recv_buffer_size {
            errors.push("Socket receive buffer size cannot be 0".to_string());
        }

        if let Some(0) = self.socket_send_buffer_size {
            errors.push("Socket send buffer size cannot be 0".to_string());
        }

        if let Some(ttl) = self.ttl {
            if ttl == 0 || ttl > 255 {
                errors.push(format!("Invalid TTL: {ttl} (valid range: 1-255)"));
            }
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("datagram-protocol"),
            log_level: Level::INFO,
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
