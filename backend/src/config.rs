//! Configuration management for the Blood Bank Management System
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with BBMS prefix (`BBMS__SECTION__KEY`)

use chrono::{FixedOffset, Offset, Utc};
use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT verification configuration
    pub jwt: JwtConfig,

    /// Outbound alert webhook
    pub notification: NotificationConfig,

    /// Analytics report defaults
    pub reporting: ReportingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret used to verify access tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Alerts are only logged when disabled
    pub enabled: bool,

    /// Endpoint receiving alert payloads as JSON
    pub webhook_url: Option<String>,

    /// Key for the `X-BBMS-Signature` header
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportingConfig {
    /// Offset used to turn ledger timestamps into calendar dates
    pub utc_offset_minutes: i32,

    /// Window length when no start date is given
    pub default_window_days: i64,

    /// Active override parameter set
    pub parameter_set: String,
}

impl ReportingConfig {
    /// Falls back to UTC for out-of-range offsets
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("BBMS_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.secret", "development-secret-key")?
            .set_default("notification.enabled", false)?
            .set_default("reporting.utc_offset_minutes", 540)?
            .set_default("reporting.default_window_days", 30)?
            .set_default("reporting.parameter_set", shared::DEFAULT_PARAMETER_SET)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (BBMS prefix)
            .add_source(
                Environment::with_prefix("BBMS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 540,
            default_window_days: 30,
            parameter_set: shared::DEFAULT_PARAMETER_SET.to_string(),
        }
    }
}
