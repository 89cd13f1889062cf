//! Off-actor reads: reconstruct a room's current state straight from the
//! durable log and project it for one viewer, without going through the
//! room actor's mailbox. The in-memory state is read-only outside the actor
//! task, so a reader obtains its own copy and projects off-thread; here
//! "the copy" is a replay from the event store rather than a snapshot of
//! the live actor, which keeps this path usable even when no actor for the
//! room happens to be running (e.g. an HTTP "current state" endpoint hit
//! between games).

use crate::event_store::{EventStore, EventStoreError};
use crate::model::{RoomId, Viewer};
use crate::projection;
use crate::room_actor::load_state;
use crate::rule_engine::RuleEngine;

/// The current projected state for `viewer`, reconstructed from the newest
/// snapshot plus everything after it.
pub async fn projected_state<R: RuleEngine>(
    engine: &R,
    store: &dyn EventStore,
    room_id: RoomId,
    viewer: Viewer,
) -> Result<serde_json::Value, EventStoreError> {
    let (state, _last_seq) = load_state(engine, store, room_id).await?;
    let marshalled = engine.marshal(&state);
    Ok(projection::project_state(&marshalled, viewer))
}
