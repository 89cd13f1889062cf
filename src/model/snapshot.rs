//! Point-in-time state checkpoints used to shorten replay. Advisory only —
//! the event log is always the ground truth; snapshots are an optimization,
//! never a replacement for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::command::RoomId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub room_id: RoomId,
    pub last_seq: u64,
    pub state_blob: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A snapshot prior to persistence; `created_at` is filled in by the store.
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub last_seq: u64,
    pub state_blob: serde_json::Value,
}
