//! The durable, append-only event log: sequence allocation, dedup records
//! and snapshots, all joined by one atomicity guarantee.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{DedupRecord, Event, NewDedupRecord, NewEvent, NewSnapshot, PlayerId, RoomId, Snapshot};

/// Everything `append` needs to commit atomically: the new events (not yet
/// sequenced), the dedup row for the command that produced them, and an
/// optional snapshot of the state that results from applying them.
#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub events: Vec<NewEvent>,
    pub dedup: NewDedupRecord,
    pub snapshot: Option<NewSnapshot>,
}

/// Errors the event store surfaces to the room actor.
///
/// `Conflict` and `Duplicate` are distinguished from `Storage` because the
/// room actor treats them differently: `Conflict` means the store observed
/// corruption (a `(room_id, seq)` collision) and is fatal for the actor;
/// `Duplicate` means another command slipped in with the same idempotency
/// key between the actor's own dedup lookup and its append — a defensive
/// last line against that race — and is retried as a fresh dedup lookup,
/// not treated as fatal.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("event sequence collision for room {room_id}: store corruption")]
    Conflict { room_id: RoomId },
    #[error("duplicate command: dedup row for this key already exists")]
    Duplicate,
    #[error("event store unavailable: {0}")]
    Storage(String),
    #[error("room {0} not found")]
    NotFound(RoomId),
}

/// Durable event log, idempotency table and snapshot store for every room.
///
/// One `Send + Sync` async trait object implemented by both an in-memory
/// test double and a real backend, injected wherever the core needs
/// persistence.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// The newest snapshot for a room, or `None` if it has never been snapshotted.
    async fn load_snapshot(&self, room_id: RoomId) -> Result<Option<Snapshot>, EventStoreError>;

    /// Events with `seq > after`, ascending. `limit = 0` means unbounded.
    async fn load_events_after(
        &self,
        room_id: RoomId,
        after: u64,
        limit: u64,
    ) -> Result<Vec<Event>, EventStoreError>;

    /// Events with `seq <= up_to`, ascending.
    async fn load_events_up_to(
        &self,
        room_id: RoomId,
        up_to: u64,
    ) -> Result<Vec<Event>, EventStoreError>;

    /// The prior result for this command, if it has already been processed.
    async fn get_dedup(
        &self,
        room_id: RoomId,
        actor_user_id: PlayerId,
        idempotency_key: &str,
        command_type: &str,
    ) -> Result<Option<DedupRecord>, EventStoreError>;

    /// Atomically: assign sequence numbers to `request.events`, insert the
    /// dedup row, insert the events, and (if present) the snapshot; advance
    /// the room's sequence counter. Returns the events with `seq` filled in.
    async fn append(
        &self,
        room_id: RoomId,
        request: AppendRequest,
    ) -> Result<Vec<Event>, EventStoreError>;
}
