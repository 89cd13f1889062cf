//! In-memory `EventStore`, used by tests and the default binary. Preserves
//! the same atomicity semantics as the Postgres backend: an in-memory-only
//! backend is fine for tests, but it must commit sequence assignment, the
//! dedup insert and the event insert together just as a real backend would.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::model::{DedupRecord, Event, NewDedupRecord, NewEvent, NewSnapshot, PlayerId, RoomId, Snapshot};

use super::{AppendRequest, EventStore, EventStoreError};

type DedupMapKey = (PlayerId, String, String);

#[derive(Default)]
struct RoomLog {
    next_seq: u64,
    events: Vec<Event>,
    dedup: HashMap<DedupMapKey, DedupRecord>,
    snapshots: Vec<Snapshot>,
}

/// `Arc<RwLock<HashMap<RoomId, Arc<Mutex<RoomLog>>>>>`: the outer lock only
/// guards room creation; the per-room `Mutex` is held for the whole `append`
/// so sequence assignment, the dedup insert and the event insert are atomic.
#[derive(Default)]
pub struct InMemoryEventStore {
    rooms: RwLock<HashMap<RoomId, Arc<Mutex<RoomLog>>>>,
}

impl InMemoryEventStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn room_log(&self, room_id: RoomId) -> Arc<Mutex<RoomLog>> {
        if let Some(log) = self.rooms.read().await.get(&room_id) {
            return Arc::clone(log);
        }

        let mut rooms = self.rooms.write().await;
        Arc::clone(
            rooms
                .entry(room_id)
                .or_insert_with(|| Arc::new(Mutex::new(RoomLog::default()))),
        )
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn load_snapshot(&self, room_id: RoomId) -> Result<Option<Snapshot>, EventStoreError> {
        let log = self.room_log(room_id).await;
        let log = log.lock().await;
        Ok(log.snapshots.iter().max_by_key(|s| s.last_seq).cloned())
    }

    async fn load_events_after(
        &self,
        room_id: RoomId,
        after: u64,
        limit: u64,
    ) -> Result<Vec<Event>, EventStoreError> {
        let log = self.room_log(room_id).await;
        let log = log.lock().await;
        let iter = log.events.iter().filter(|e| e.seq > after).cloned();
        Ok(if limit == 0 {
            iter.collect()
        } else {
            iter.take(limit as usize).collect()
        })
    }

    async fn load_events_up_to(
        &self,
        room_id: RoomId,
        up_to: u64,
    ) -> Result<Vec<Event>, EventStoreError> {
        let log = self.room_log(room_id).await;
        let log = log.lock().await;
        Ok(log.events.iter().filter(|e| e.seq <= up_to).cloned().collect())
    }

    async fn get_dedup(
        &self,
        room_id: RoomId,
        actor_user_id: PlayerId,
        idempotency_key: &str,
        command_type: &str,
    ) -> Result<Option<DedupRecord>, EventStoreError> {
        let log = self.room_log(room_id).await;
        let log = log.lock().await;
        let key = (
            actor_user_id,
            idempotency_key.to_string(),
            command_type.to_string(),
        );
        Ok(log.dedup.get(&key).cloned())
    }

    async fn append(
        &self,
        room_id: RoomId,
        request: AppendRequest,
    ) -> Result<Vec<Event>, EventStoreError> {
        let log = self.room_log(room_id).await;
        let mut log = log.lock().await;

        let dedup_key = (
            request.dedup.actor_user_id,
            request.dedup.idempotency_key.clone(),
            request.dedup.command_type.clone(),
        );
        if log.dedup.contains_key(&dedup_key) {
            return Err(EventStoreError::Duplicate);
        }

        let now = Utc::now();
        let mut start_seq = log.next_seq + 1;
        let mut assigned = Vec::with_capacity(request.events.len());
        for new_event in request.events {
            let event = new_event.into_event(room_id, start_seq, now);
            start_seq += 1;
            assigned.push(event);
        }

        for event in &assigned {
            if log.events.iter().any(|existing| existing.seq == event.seq) {
                return Err(EventStoreError::Conflict { room_id });
            }
        }

        log.dedup.insert(
            dedup_key,
            DedupRecord {
                room_id,
                actor_user_id: request.dedup.actor_user_id,
                idempotency_key: request.dedup.idempotency_key,
                command_type: request.dedup.command_type,
                command_id: request.dedup.command_id,
                result: request.dedup.result,
                created_at: now,
            },
        );

        log.events.extend(assigned.iter().cloned());

        if let Some(new_snapshot) = request.snapshot {
            log.snapshots.push(Snapshot {
                room_id,
                last_seq: new_snapshot.last_seq,
                state_blob: new_snapshot.state_blob,
                created_at: now,
            });
        }

        log.next_seq += assigned.len() as u64;

        Ok(assigned)
    }
}
