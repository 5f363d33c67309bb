/// Database configuration and connection management
pub mod database;

/// Loyalty program configuration loading from config.toml
pub mod loyalty;

/// Process settings read from environment variables
pub mod settings;
