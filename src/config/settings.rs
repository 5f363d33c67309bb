//! Process settings loaded from environment variables.
//!
//! `.env` is read by `main` before [`Settings::from_env`] runs, so every value here can
//! come from either the real environment or the dotenv file.

use super::{database, loyalty::LoyaltyConfig};
use crate::errors::{Error, Result};
use std::net::SocketAddr;

/// Default HTTP listen address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Default loyalty config path
pub const DEFAULT_LOYALTY_CONFIG: &str = "config.toml";

/// Everything the service needs to start
#[derive(Debug, Clone)]
pub struct Settings {
    /// `SeaORM` connection string
    pub database_url: String,
    /// HTTP API listen address
    pub bind_addr: SocketAddr,
    /// Path of the loyalty TOML file
    pub loyalty_config_path: String,
    /// Staff bot token; the bot is not started without one
    pub discord_token: Option<String>,
}

impl Settings {
    /// Reads `DATABASE_URL`, `BIND_ADDR`, `LOYALTY_CONFIG` and `DISCORD_BOT_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let bind_addr_raw =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr_raw.parse().map_err(|e| Error::Config {
            message: format!("Invalid BIND_ADDR '{bind_addr_raw}': {e}"),
        })?;

        Ok(Self {
            database_url: database::get_database_url(),
            bind_addr,
            loyalty_config_path: std::env::var("LOYALTY_CONFIG")
                .unwrap_or_else(|_| DEFAULT_LOYALTY_CONFIG.to_string()),
            discord_token: std::env::var("DISCORD_BOT_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
        })
    }
}

/// Shared, read-only application context handed to the HTTP API and the staff bot
#[derive(Debug, Clone)]
pub struct AppContext {
    /// Database connection pool
    pub database: sea_orm::DatabaseConnection,
    /// Loyalty program configuration
    pub loyalty: std::sync::Arc<LoyaltyConfig>,
}

impl AppContext {
    /// Bundles a connection and a loyalty configuration
    #[must_use]
    pub fn new(database: sea_orm::DatabaseConnection, loyalty: LoyaltyConfig) -> Self {
        Self {
            database,
            loyalty: std::sync::Arc::new(loyalty),
        }
    }
}
