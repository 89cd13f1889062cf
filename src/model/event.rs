//! Durable events and the viewer-projected events fanned out to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::command::{CommandId, PlayerId, RoomId};

pub type EventId = Uuid;

/// An immutable fact persisted by the event store.
///
/// `seq` is unset (`0`) until `EventStore::append` assigns it; the rule
/// engine and the room actor's optimistic next-state computation must never
/// read `seq` as authoritative before a successful append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub room_id: RoomId,
    pub seq: u64,
    pub event_id: EventId,
    pub event_type: String,
    pub actor_user_id: PlayerId,
    pub causation_command_id: Option<CommandId>,
    pub payload: serde_json::Value,
    pub server_timestamp: DateTime<Utc>,
}

/// An event before sequence assignment, produced by `RuleEngine::handle_command`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub event_id: EventId,
    pub event_type: String,
    pub actor_user_id: PlayerId,
    pub causation_command_id: Option<CommandId>,
    pub payload: serde_json::Value,
}

impl NewEvent {
    /// Assign a sequence number and timestamp, turning this into a durable `Event`.
    #[must_use]
    pub fn into_event(self, room_id: RoomId, seq: u64, server_timestamp: DateTime<Utc>) -> Event {
        Event {
            room_id,
            seq,
            event_id: self.event_id,
            event_type: self.event_type,
            actor_user_id: self.actor_user_id,
            causation_command_id: self.causation_command_id,
            payload: self.payload,
            server_timestamp,
        }
    }
}

/// The viewer-specific, post-projection form of an event delivered over a
/// subscription. `data` may have had private fields redacted relative to the
/// source event's `payload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectedEvent {
    pub room_id: RoomId,
    pub seq: u64,
    pub event_type: String,
    pub data: serde_json::Value,
    pub server_timestamp: DateTime<Utc>,
}
