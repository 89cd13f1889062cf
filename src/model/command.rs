//! The command envelope: the input to the core pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RoomId = Uuid;
pub type PlayerId = Uuid;
pub type CommandId = Uuid;

/// A client intent to change room state, addressed to one room actor.
///
/// `idempotency_key` is scoped by `(room_id, actor_user_id, command_type)` and
/// enforces at-most-once *effect* per key; `command_id` only correlates the
/// synchronous result back to the caller, it is not a uniqueness key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub command_id: CommandId,
    pub room_id: RoomId,
    pub actor_user_id: PlayerId,
    pub command_type: String,
    pub idempotency_key: String,
    /// Sequence the client last observed, for optimistic-read checks the rule
    /// engine may perform. Opaque to the core.
    pub last_seen_seq: Option<u64>,
    pub payload: serde_json::Value,
}

impl CommandEnvelope {
    /// The dedup key this command is scoped by: `(actor, idempotency_key, type)`.
    /// `room_id` is carried separately since the dedup table is already keyed
    /// per room by the event store.
    #[must_use]
    pub fn dedup_key(&self) -> (PlayerId, &str, &str) {
        (self.actor_user_id, &self.idempotency_key, &self.command_type)
    }
}
