//! Room actor behavior configuration.

use super::defaults::{
    default_idle_timeout_secs, default_mailbox_capacity, default_snapshot_interval,
    default_subscriber_buffer_size,
};
use serde::{Deserialize, Serialize};

/// Tuning knobs for the room actor and its subscription fan-out.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RoomActorConfig {
    /// Capacity of a room actor's command mailbox.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
    /// Capacity of each subscriber's projected-event delivery channel.
    #[serde(default = "default_subscriber_buffer_size")]
    pub subscriber_buffer_size: usize,
    /// Take a snapshot every N persisted events for a room. Zero disables
    /// snapshotting; recovery then always replays from the start of the log.
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval: u64,
    /// How long a room actor may have no subscribers and receive no commands
    /// before the registry retires it.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for RoomActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            subscriber_buffer_size: default_subscriber_buffer_size(),
            snapshot_interval: default_snapshot_interval(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}
