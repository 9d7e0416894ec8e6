//! Configuration management for the Batchtrace server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with BATCHTRACE_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub jwt: JwtConfig,

    /// Stock rules and allocation tuning
    pub inventory: InventoryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
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
    /// Secret key for verifying actor tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InventoryConfig {
    /// Minimum days between ingredient batch creation and expiration
    pub min_expiration_days: i64,

    /// Window for the almost-expiring report
    pub almost_expiring_days: i64,

    /// Attempts at a production run before reporting contention
    pub allocation_max_retries: u32,

    /// Per-transaction lock wait limit
    pub lock_timeout_ms: u64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            min_expiration_days: 90,
            almost_expiring_days: 10,
            allocation_max_retries: 3,
            lock_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("BATCHTRACE_ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let defaults = InventoryConfig::default();

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("inventory.min_expiration_days", defaults.min_expiration_days)?
            .set_default("inventory.almost_expiring_days", defaults.almost_expiring_days)?
            .set_default("inventory.allocation_max_retries", i64::from(defaults.allocation_max_retries))?
            .set_default("inventory.lock_timeout_ms", defaults.lock_timeout_ms as i64)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (BATCHTRACE_ prefix)
            .add_source(
                Environment::with_prefix("BATCHTRACE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
