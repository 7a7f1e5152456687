//! Gateway configuration using Figment.
//!
//! Configuration is layered, highest precedence last:
//! 1. built-in defaults
//! 2. `config/gateway.toml` (a missing file is not an error)
//! 3. environment variables prefixed with `HWGATE_`
//!
//! Command-line flags are applied on top by the binary.
//!
//! # Environment Variable Overrides
//!
//! Nested keys are separated by a double underscore:
//!
//! ```text
//! HWGATE_APPLICATION__LOG_LEVEL=debug
//! HWGATE_SERVER__PORT=7000
//! HWGATE_HARDWARE__BASE_URL=http://10.0.0.12:5001/
//! HWGATE_HARDWARE__RETRY__BACKOFF=250ms
//! ```
//!
//! # Example
//!
//! ```no_run
//! use hardware_gateway::config::GatewayConfig;
//!
//! let config = GatewayConfig::load()?;
//! println!("listening on {}:{}", config.server.host, config.server.port);
//! # Ok::<(), hardware_gateway::config::ConfigError>(())
//! ```

use crate::gateway::RetryPolicy;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/gateway.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "HWGATE_";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration sources could not be read or deserialized.
    #[error("Configuration load error: {0}")]
    LoadError(#[from] figment::Error),

    /// A value was read but is not acceptable.
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Top-level gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Client-facing TCP listener
    #[serde(default)]
    pub server: ServerConfig,
    /// Device endpoint
    #[serde(default)]
    pub hardware: HardwareConfig,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, colored when attached to a terminal.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => f.write_str("pretty"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

/// TCP listener configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest command accepted in one read
    #[serde(default = "default_max_command_bytes")]
    pub max_command_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_command_bytes: default_max_command_bytes(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Device endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Base URL commands are appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Retry budget per command
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            retry: RetryPolicy::default(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_name() -> String {
    "hardware-gateway".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    6001
}

fn default_max_command_bytes() -> usize {
    1024
}

fn default_base_url() -> String {
    "http://hardware:5001/".to_string()
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl GatewayConfig {
    /// Load configuration from `config/gateway.toml` and environment variables.
    ///
    /// # Errors
    ///
    /// Returns a ConfigError if the sources cannot be parsed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file (relative or absolute)
    ///
    /// # Errors
    ///
    /// Returns a ConfigError if the file is malformed or the result is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::figment(path.as_ref())
            .extract::<Self>()
            .map_err(ConfigError::LoadError)?;
        config.validate()?;
        Ok(config)
    }

    /// The layered provider stack, before extraction.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading.
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - `server.max_command_bytes` is non-zero
    /// - `hardware.base_url` is an http or https URL
    /// - `hardware.retry.max_attempts` is at least 1
    ///
    /// # Errors
    ///
    /// Returns a ConfigError with a descriptive message for any validation failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.server.max_command_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "server.max_command_bytes must be greater than 0".to_string(),
            ));
        }

        match reqwest::Url::parse(&self.hardware.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid hardware.base_url '{}': unsupported scheme '{}'",
                    self.hardware.base_url,
                    url.scheme()
                )))
            }
            Err(e) => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid hardware.base_url '{}': {}",
                    self.hardware.base_url, e
                )))
            }
        }

        if self.hardware.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "hardware.retry.max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
