/// Database configuration, connection management and the single-writer store
pub mod database;

/// Application settings loaded from config.toml
pub mod settings;

/// Session user resolution from environment variables
pub mod users;
