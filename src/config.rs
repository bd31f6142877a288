//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//!
//! # Bandwidth Configuration
//!
//! - `BANDWIDTH_LIMITS`: Static limits, `endpoint=rate,...` in bytes/second (default: none)
//! - `BANDWIDTH_ENFORCEMENT`: `throttle` or `reject` (default: `throttle`)
//! - `MAX_BUFFERED_BODY_SIZE`: Largest known-length body paced as one buffer (default: 1MiB)

use std::env;

use crate::error::{AppError, AppResult};
use crate::limits::LimitMap;
use crate::middleware::{DEFAULT_MAX_BUFFERED_BODY_SIZE, Enforcement};
use crate::validation::parse_limit_spec;

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    // =========================================================================
    // Bandwidth Configuration
    // =========================================================================
    /// Statically configured limits, keyed by endpoint identifier.
    /// Runtime limits set through the admin API override these.
    pub bandwidth_limits: LimitMap,

    /// What happens to responses on limited endpoints (default: throttle)
    pub enforcement: Enforcement,

    /// Bodies of known length up to this size are paced before the response
    /// head is sent; larger or unsized bodies are paced per chunk.
    pub max_buffered_body_size: u64,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if any configuration value is invalid
    /// (e.g., non-numeric PORT value, zero rate in BANDWIDTH_LIMITS).
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 3000)?,

            // Bandwidth
            bandwidth_limits: Self::parse_bandwidth_limits()?,
            enforcement: Self::parse_env("BANDWIDTH_ENFORCEMENT", Enforcement::Throttle)?,
            max_buffered_body_size: Self::parse_env(
                "MAX_BUFFERED_BODY_SIZE",
                DEFAULT_MAX_BUFFERED_BODY_SIZE,
            )?,

            // Observability
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    fn validate(&self) -> AppResult<()> {
        if self.max_buffered_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_BUFFERED_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        if self.metrics_enabled() {
            Some(std::net::SocketAddr::from((
                [0, 0, 0, 0],
                self.metrics_port,
            )))
        } else {
            None
        }
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse static bandwidth limits from `BANDWIDTH_LIMITS`.
    ///
    /// Format: `endpoint=rate,...` (e.g., "get_data=10000,slow=50")
    fn parse_bandwidth_limits() -> AppResult<LimitMap> {
        match env::var("BANDWIDTH_LIMITS") {
            Ok(spec) => parse_limit_spec(&spec)
                .map_err(|e| AppError::ConfigError(format!("Invalid BANDWIDTH_LIMITS: {e}"))),
            Err(_) => Ok(LimitMap::new()),
        }
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 3000,
            // Bandwidth
            bandwidth_limits: LimitMap::new(),
            enforcement: Enforcement::Throttle,
            max_buffered_body_size: DEFAULT_MAX_BUFFERED_BODY_SIZE,
            // Observability
            log_level: "info".to_string(),
            metrics_port: 9090,
        }
    }
}
