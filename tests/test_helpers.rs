//! Shared fixtures for the integration suite: a fresh in-memory store, the
//! demo rule engine, and small envelope builders so each test file stays
//! focused on the scenario it exercises.

#![allow(dead_code)]

use std::sync::Arc;

use grimoire_core::config::RoomActorConfig;
use grimoire_core::event_store::InMemoryEventStore;
use grimoire_core::model::{CommandEnvelope, RoomId};
use grimoire_core::room_actor::{self, RoomActorHandle};
use grimoire_core::demo_rules::DemoRuleEngine;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A room actor wired to its own in-memory store, ready to dispatch against.
pub struct TestRoom {
    pub handle: RoomActorHandle,
    pub store: Arc<InMemoryEventStore>,
    pub room_id: RoomId,
    pub cancellation: CancellationToken,
}

impl TestRoom {
    pub fn spawn() -> Self {
        Self::spawn_with_config(RoomActorConfig::default())
    }

    pub fn spawn_with_config(config: RoomActorConfig) -> Self {
        let store = Arc::new(InMemoryEventStore::new());
        let engine = Arc::new(DemoRuleEngine);
        let room_id = Uuid::new_v4();
        let cancellation = CancellationToken::new();
        let (handle, _join) = room_actor::spawn(room_id, engine, Arc::clone(&store), config, cancellation.clone());
        Self {
            handle,
            store,
            room_id,
            cancellation,
        }
    }

    /// Spawn a second actor over the same store and room id, as a process
    /// restart would after recovery: a fresh task rebuilding state from the
    /// durable log rather than carrying anything over in memory.
    pub fn respawn(&self, config: RoomActorConfig) -> RoomActorHandle {
        let engine = Arc::new(DemoRuleEngine);
        let cancellation = CancellationToken::new();
        let (handle, _join) = room_actor::spawn(self.room_id, engine, Arc::clone(&self.store), config, cancellation);
        handle
    }
}

pub fn command(room_id: RoomId, actor: Uuid, command_type: &str, key: &str, payload: serde_json::Value) -> CommandEnvelope {
    CommandEnvelope {
        command_id: Uuid::new_v4(),
        room_id,
        actor_user_id: actor,
        command_type: command_type.to_string(),
        idempotency_key: key.to_string(),
        last_seen_seq: None,
        payload,
    }
}

pub fn create_game(room_id: RoomId, creator: Uuid, extra_players: &[Uuid]) -> CommandEnvelope {
    let mut players = vec![serde_json::json!({"user_id": creator})];
    players.extend(extra_players.iter().map(|p| serde_json::json!({"user_id": p})));
    command(room_id, creator, "create_game", "create-1", serde_json::json!({"players": players}))
}
