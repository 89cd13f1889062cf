//! Root configuration types.

use super::defaults::{default_bind_addr, default_port};
use super::event_store::EventStoreConfig;
use super::logging::LoggingConfig;
use super::server::RoomActorConfig;
use serde::{Deserialize, Serialize};

/// Root configuration for the `grimoire-server` binary.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Address the WebSocket listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub room: RoomActorConfig,
    #[serde(default)]
    pub event_store: EventStoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            room: RoomActorConfig::default(),
            event_store: EventStoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
