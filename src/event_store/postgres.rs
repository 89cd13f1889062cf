//! `sqlx`-backed `EventStore` over Postgres, implementing the schema in
//! `migrations/0001_init.sql` literally: an append-only event table with a
//! row-locked per-room sequence counter serializing assignment under
//! concurrent writers.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::model::{
    CommandResult, DedupRecord, Event, NewEvent, PlayerId, RoomId, Snapshot,
};

use super::{AppendRequest, EventStore, EventStoreError};

pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Connect and run pending migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, EventStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| EventStoreError::Storage(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| EventStoreError::Storage(e.to_string()))?;

        Ok(Self { pool })
    }

    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn load_snapshot(&self, room_id: RoomId) -> Result<Option<Snapshot>, EventStoreError> {
        let row = sqlx::query(
            "SELECT room_id, last_seq, state_blob, created_at FROM snapshots \
             WHERE room_id = $1 ORDER BY last_seq DESC LIMIT 1",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EventStoreError::Storage(e.to_string()))?;

        Ok(row.map(|row| Snapshot {
            room_id: row.get("room_id"),
            last_seq: row.get::<i64, _>("last_seq") as u64,
            state_blob: row.get::<Json<serde_json::Value>, _>("state_blob").0,
            created_at: row.get("created_at"),
        }))
    }

    async fn load_events_after(
        &self,
        room_id: RoomId,
        after: u64,
        limit: u64,
    ) -> Result<Vec<Event>, EventStoreError> {
        let rows = if limit == 0 {
            sqlx::query(
                "SELECT room_id, seq, event_id, event_type, actor_user_id, \
                 causation_command_id, payload_blob, server_ts FROM events \
                 WHERE room_id = $1 AND seq > $2 ORDER BY seq ASC",
            )
            .bind(room_id)
            .bind(after as i64)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query(
                "SELECT room_id, seq, event_id, event_type, actor_user_id, \
                 causation_command_id, payload_blob, server_ts FROM events \
                 WHERE room_id = $1 AND seq > $2 ORDER BY seq ASC LIMIT $3",
            )
            .bind(room_id)
            .bind(after as i64)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| EventStoreError::Storage(e.to_string()))?;

        Ok(rows.iter().map(row_to_event).collect())
    }

    async fn load_events_up_to(
        &self,
        room_id: RoomId,
        up_to: u64,
    ) -> Result<Vec<Event>, EventStoreError> {
        let rows = sqlx::query(
            "SELECT room_id, seq, event_id, event_type, actor_user_id, \
             causation_command_id, payload_blob, server_ts FROM events \
             WHERE room_id = $1 AND seq <= $2 ORDER BY seq ASC",
        )
        .bind(room_id)
        .bind(up_to as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EventStoreError::Storage(e.to_string()))?;

        Ok(rows.iter().map(row_to_event).collect())
    }

    async fn get_dedup(
        &self,
        room_id: RoomId,
        actor_user_id: PlayerId,
        idempotency_key: &str,
        command_type: &str,
    ) -> Result<Option<DedupRecord>, EventStoreError> {
        let row = sqlx::query(
            "SELECT room_id, actor_user_id, idempotency_key, command_type, \
             command_id, result_blob, created_at FROM commands_dedup \
             WHERE room_id = $1 AND actor_user_id = $2 AND idempotency_key = $3 \
             AND command_type = $4",
        )
        .bind(room_id)
        .bind(actor_user_id)
        .bind(idempotency_key)
        .bind(command_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EventStoreError::Storage(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let result: CommandResult = serde_json::from_value(
            row.get::<Json<serde_json::Value>, _>("result_blob").0,
        )
        .map_err(|e| EventStoreError::Storage(e.to_string()))?;

        Ok(Some(DedupRecord {
            room_id: row.get("room_id"),
            actor_user_id: row.get("actor_user_id"),
            idempotency_key: row.get("idempotency_key"),
            command_type: row.get("command_type"),
            command_id: row.get("command_id"),
            result,
            created_at: row.get("created_at"),
        }))
    }

    async fn append(
        &self,
        room_id: RoomId,
        request: AppendRequest,
    ) -> Result<Vec<Event>, EventStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| EventStoreError::Storage(e.to_string()))?;

        // Step 1: acquire the room's sequence counter, row-locked for update.
        let next_seq: i64 = match sqlx::query(
            "SELECT next_seq FROM room_sequences WHERE room_id = $1 FOR UPDATE",
        )
        .bind(room_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| EventStoreError::Storage(e.to_string()))?
        {
            Some(row) => row.get("next_seq"),
            None => {
                sqlx::query(
                    "INSERT INTO room_sequences (room_id, next_seq) VALUES ($1, 1)",
                )
                .bind(room_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| EventStoreError::Storage(e.to_string()))?;
                1
            }
        };

        // Step 3: insert the dedup row; a primary-key violation means another
        // command with this key slipped in between the actor's own lookup
        // and this append.
        let result_blob = serde_json::to_value(&request.dedup.result)
            .map_err(|e| EventStoreError::Storage(e.to_string()))?;
        let dedup_insert = sqlx::query(
            "INSERT INTO commands_dedup \
             (room_id, actor_user_id, idempotency_key, command_type, command_id, result_blob, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, now()) \
             ON CONFLICT (room_id, actor_user_id, idempotency_key, command_type) DO NOTHING",
        )
        .bind(room_id)
        .bind(request.dedup.actor_user_id)
        .bind(&request.dedup.idempotency_key)
        .bind(&request.dedup.command_type)
        .bind(request.dedup.command_id)
        .bind(Json(result_blob))
        .execute(&mut *tx)
        .await
        .map_err(|e| EventStoreError::Storage(e.to_string()))?;

        if dedup_insert.rows_affected() == 0 {
            return Err(EventStoreError::Duplicate);
        }

        // Step 2: assign sequence numbers.
        let mut seq = next_seq as u64;
        let mut assigned = Vec::with_capacity(request.events.len());
        for new_event in request.events {
            let event = new_event.into_event(room_id, seq, chrono::Utc::now());
            seq += 1;
            assigned.push(event);
        }

        // Step 4: insert the events. A `(room_id, seq)` collision is
        // impossible by construction and indicates store corruption.
        for event in &assigned {
            let inserted = sqlx::query(
                "INSERT INTO events \
                 (room_id, seq, event_id, event_type, actor_user_id, causation_command_id, payload_blob, server_ts) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (room_id, seq) DO NOTHING",
            )
            .bind(event.room_id)
            .bind(event.seq as i64)
            .bind(event.event_id)
            .bind(&event.event_type)
            .bind(event.actor_user_id)
            .bind(event.causation_command_id)
            .bind(Json(event.payload.clone()))
            .bind(event.server_timestamp)
            .execute(&mut *tx)
            .await
            .map_err(|e| EventStoreError::Storage(e.to_string()))?;

            if inserted.rows_affected() == 0 {
                return Err(EventStoreError::Conflict { room_id });
            }
        }

        // Step 5: optional snapshot.
        if let Some(new_snapshot) = request.snapshot {
            sqlx::query(
                "INSERT INTO snapshots (room_id, last_seq, state_blob, created_at) \
                 VALUES ($1, $2, $3, now())",
            )
            .bind(room_id)
            .bind(new_snapshot.last_seq as i64)
            .bind(Json(new_snapshot.state_blob))
            .execute(&mut *tx)
            .await
            .map_err(|e| EventStoreError::Storage(e.to_string()))?;
        }

        // Step 6: advance the counter.
        sqlx::query("UPDATE room_sequences SET next_seq = $1 WHERE room_id = $2")
            .bind(seq as i64)
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| EventStoreError::Storage(e.to_string()))?;

        // Step 7: commit.
        tx.commit()
            .await
            .map_err(|e| EventStoreError::Storage(e.to_string()))?;

        Ok(assigned)
    }
}

fn row_to_event(row: &sqlx::postgres::PgRow) -> Event {
    Event {
        room_id: row.get("room_id"),
        seq: row.get::<i64, _>("seq") as u64,
        event_id: row.get("event_id"),
        event_type: row.get("event_type"),
        actor_user_id: row.get("actor_user_id"),
        causation_command_id: row.get("causation_command_id"),
        payload: row.get::<Json<serde_json::Value>, _>("payload_blob").0,
        server_timestamp: row.get("server_ts"),
    }
}
