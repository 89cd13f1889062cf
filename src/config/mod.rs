//! Configuration module for `grimoire-server`.
//!
//! Provides comprehensive configuration management with support for:
//! - JSON configuration files
//! - Environment variable overrides
//! - Stdin input
//! - Sensible defaults
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`server`]: Room actor behavior configuration (mailbox/buffer sizes, snapshotting)
//! - [`event_store`]: Event store backend selection
//! - [`logging`]: Logging configuration
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

// Submodules
pub mod defaults;
pub mod event_store;
pub mod loader;
pub mod logging;
pub mod server;
pub mod types;
pub mod validation;

// Re-exports for convenience
pub use event_store::EventStoreConfig;

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use server::RoomActorConfig;

pub use types::Config;

pub use validation::validate_config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.port, 7777);
        assert_eq!(config.room.mailbox_capacity, 256);
        assert_eq!(config.room.subscriber_buffer_size, 64);
        assert_eq!(config.room.snapshot_interval, 50);
        assert!(matches!(config.event_store, EventStoreConfig::InMemory));
        assert_eq!(config.logging.dir, "logs");
        assert_eq!(config.logging.filename, "grimoire-server.log");
        assert_eq!(config.logging.rotation, "daily");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(config.port, deserialized.port);
        assert_eq!(
            config.room.mailbox_capacity,
            deserialized.room.mailbox_capacity
        );
        assert_eq!(
            config.room.snapshot_interval,
            deserialized.room.snapshot_interval
        );
    }

    #[test]
    fn test_event_store_config_postgres_requires_database_url() {
        let cfg = Config {
            event_store: EventStoreConfig::Postgres {
                database_url: String::new(),
                max_connections: 10,
            },
            ..Config::default()
        };

        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Trace.to_string(), "trace");
        assert_eq!(LogLevel::Debug.to_string(), "debug");
        assert_eq!(LogLevel::Info.to_string(), "info");
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(LogLevel::Error.to_string(), "error");
    }

    #[test]
    fn test_log_level_as_str() {
        assert_eq!(LogLevel::Trace.as_str(), "trace");
        assert_eq!(LogLevel::Debug.as_str(), "debug");
        assert_eq!(LogLevel::Info.as_str(), "info");
        assert_eq!(LogLevel::Warn.as_str(), "warn");
        assert_eq!(LogLevel::Error.as_str(), "error");
    }
}
