//! Event store backend configuration.

use super::defaults::default_postgres_max_connections;
use serde::{Deserialize, Serialize};

/// Selects and configures the `EventStore` backend: an enum over backend
/// kind, with `InMemory` carrying no fields.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum EventStoreConfig {
    InMemory,
    Postgres {
        database_url: String,
        #[serde(default = "default_postgres_max_connections")]
        max_connections: u32,
    },
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self::InMemory
    }
}
