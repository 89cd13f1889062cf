//! Idempotency records: one row per `(room_id, actor_user_id, idempotency_key, command_type)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::command::{CommandId, PlayerId, RoomId};
use super::result::CommandResult;

/// A persisted dedup row, written atomically with the events it corresponds to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupRecord {
    pub room_id: RoomId,
    pub actor_user_id: PlayerId,
    pub idempotency_key: String,
    pub command_type: String,
    pub command_id: CommandId,
    pub result: CommandResult,
    pub created_at: DateTime<Utc>,
}

/// A dedup row prior to persistence; `created_at` is filled in by the store.
#[derive(Debug, Clone)]
pub struct NewDedupRecord {
    pub actor_user_id: PlayerId,
    pub idempotency_key: String,
    pub command_type: String,
    pub command_id: CommandId,
    pub result: CommandResult,
}
