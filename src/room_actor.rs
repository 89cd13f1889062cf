//! The single-writer room actor: one dedicated task per live room, serializing
//! every command and subscription change through its mailbox.
//!
//! A dedicated cooperative task on the async runtime's work-stealing
//! scheduler, with a per-connection-style task loop processing one mailbox.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::RoomActorConfig;
use crate::error::CommandError;
use crate::event_store::{AppendRequest, EventStore, EventStoreError};
use crate::model::{
    CommandEnvelope, CommandResult, NewDedupRecord, NewSnapshot, ProjectedEvent, Rejection, RoomId,
    Viewer,
};
use crate::projection;
use crate::reducer::apply_history;
use crate::rule_engine::RuleEngine;

pub type SubscriptionId = Uuid;

/// Reply handed back to a caller who just subscribed.
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
}

struct SubscribeRequest {
    viewer: Viewer,
    last_seq: u64,
    sink: mpsc::Sender<ProjectedEvent>,
    reply: oneshot::Sender<SubscriptionHandle>,
}

enum ActorMessage {
    Dispatch(CommandEnvelope, oneshot::Sender<Result<CommandResult, CommandError>>),
    Subscribe(SubscribeRequest),
    Unsubscribe(SubscriptionId),
}

struct SubscriberEntry {
    viewer: Viewer,
    sink: mpsc::Sender<ProjectedEvent>,
    /// Flipped (never cleared) once a delivery to this subscriber has been
    /// dropped for a full buffer; the subscriber must notice the sequence
    /// gap and resync. Set from spawned broadcast tasks, so it's an atomic
    /// rather than a field behind the (single-task-owned) table's own lock.
    degraded: Arc<AtomicBool>,
}

/// The cloneable handle callers and the `RoomRegistry` hold. Not generic
/// over the rule engine: nothing crossing this boundary needs the engine's
/// associated state type, so the handle stays a plain, object-safety-free
/// value type.
#[derive(Clone)]
pub struct RoomActorHandle {
    pub room_id: RoomId,
    tx: mpsc::Sender<ActorMessage>,
}

impl RoomActorHandle {
    /// Submit a command and wait for its result. `Ok` always carries a
    /// `CommandResult`, including the rejected and duplicate cases; `Err` is
    /// reserved for storage/internal failures.
    pub async fn dispatch(&self, cmd: CommandEnvelope) -> Result<CommandResult, CommandError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ActorMessage::Dispatch(cmd, reply_tx))
            .await
            .map_err(|_| CommandError::Internal("room actor is no longer running".to_string()))?;
        reply_rx
            .await
            .map_err(|_| CommandError::Internal("room actor dropped the reply channel".to_string()))?
    }

    /// Subscribe for live projected events, replaying everything after
    /// `last_seq` first. The replay-then-live handoff is atomic because it
    /// all happens inside the actor's handling of this one message.
    pub async fn subscribe(
        &self,
        viewer: Viewer,
        last_seq: u64,
        sink: mpsc::Sender<ProjectedEvent>,
    ) -> Result<SubscriptionHandle, CommandError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ActorMessage::Subscribe(SubscribeRequest {
                viewer,
                last_seq,
                sink,
                reply: reply_tx,
            }))
            .await
            .map_err(|_| CommandError::Internal("room actor is no longer running".to_string()))?;
        reply_rx
            .await
            .map_err(|_| CommandError::Internal("room actor dropped the reply channel".to_string()))
    }

    /// Immediate removal; any delivery already in flight may still land.
    pub async fn unsubscribe(&self, id: SubscriptionId) {
        let _ = self.tx.send(ActorMessage::Unsubscribe(id)).await;
    }
}

/// Spawn a room actor. The returned `JoinHandle` resolves when the actor's
/// run loop ends, whether from cancellation, mailbox closure, or a fatal
/// error — the `RoomRegistry` awaits it to know when to evict the entry.
pub fn spawn<R: RuleEngine>(
    room_id: RoomId,
    engine: Arc<R>,
    store: Arc<dyn EventStore>,
    config: RoomActorConfig,
    cancellation: CancellationToken,
) -> (RoomActorHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.mailbox_capacity);
    let join = tokio::spawn(run(room_id, engine, store, config, rx, cancellation));
    (RoomActorHandle { room_id, tx }, join)
}

/// Rebuild a room's state from the durable log: the latest snapshot (if
/// any) folded with everything after it. Used both at actor startup and by
/// [`crate::read_model`] for off-actor reads, which take a fresh copy of the
/// state and project it off-thread rather than touching the live actor.
pub(crate) async fn load_state<R: RuleEngine>(
    engine: &R,
    store: &dyn EventStore,
    room_id: RoomId,
) -> Result<(R::State, u64), EventStoreError> {
    let (state, last_seq) = match store.load_snapshot(room_id).await? {
        Some(snapshot) => {
            let state = engine
                .unmarshal(snapshot.state_blob)
                .map_err(|e| EventStoreError::Storage(e.to_string()))?;
            (state, snapshot.last_seq)
        }
        None => (engine.new_state(), 0),
    };

    let events = store.load_events_after(room_id, last_seq, 0).await?;
    let state = apply_history(engine, state, &events, last_seq)
        .map_err(|e| EventStoreError::Storage(e.to_string()))?;
    let last_seq = events.last().map_or(last_seq, |e| e.seq);

    Ok((state, last_seq))
}

async fn run<R: RuleEngine>(
    room_id: RoomId,
    engine: Arc<R>,
    store: Arc<dyn EventStore>,
    config: RoomActorConfig,
    mut mailbox: mpsc::Receiver<ActorMessage>,
    cancellation: CancellationToken,
) {
    let (mut state, mut last_seq) = match load_state(&*engine, &*store, room_id).await {
        Ok(loaded) => loaded,
        Err(error) => {
            tracing::error!(room_id = %room_id, %error, "failed to load room state, actor exiting");
            return;
        }
    };

    let mut subscribers: HashMap<SubscriptionId, SubscriberEntry> = HashMap::new();

    // A room actor is destroyed when idle long enough. `idle_timeout_secs
    // = 0` disables eviction (the `if` guard below then keeps the sleep
    // branch unpolled). Any mailbox activity — not just commands — resets
    // the clock, including subscribe/unsubscribe traffic.
    let idle_enabled = config.idle_timeout_secs > 0;
    let idle_duration = Duration::from_secs(config.idle_timeout_secs.max(1));
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            () = cancellation.cancelled() => {
                tracing::info!(room_id = %room_id, "room actor cancelled");
                return;
            }
            () = tokio::time::sleep_until(last_activity + idle_duration), if idle_enabled => {
                if subscribers.is_empty() {
                    tracing::info!(room_id = %room_id, "room actor idle, retiring");
                    return;
                }
                last_activity = Instant::now();
            }
            maybe_msg = mailbox.recv() => {
                let Some(msg) = maybe_msg else {
                    tracing::debug!(room_id = %room_id, "room actor mailbox closed");
                    return;
                };
                last_activity = Instant::now();

                match msg {
                    ActorMessage::Dispatch(cmd, reply) => {
                        match process_command(&*engine, &*store, &config, room_id, &state, last_seq, cmd).await {
                            ProcessOutcome::Persisted { result, new_state, new_last_seq, broadcast_events } => {
                                state = new_state;
                                last_seq = new_last_seq;
                                let _ = reply.send(Ok(result));
                                if !broadcast_events.is_empty() {
                                    broadcast(&subscribers, &broadcast_events).await;
                                }
                            }
                            ProcessOutcome::NotPersisted(result) => {
                                let _ = reply.send(Ok(result));
                            }
                            ProcessOutcome::Storage(err) => {
                                let _ = reply.send(Err(CommandError::Storage(err)));
                            }
                            ProcessOutcome::Fatal(message) => {
                                tracing::error!(room_id = %room_id, %message, "room actor hit a fatal error, exiting");
                                let _ = reply.send(Err(CommandError::Internal(message)));
                                return;
                            }
                        }
                    }
                    ActorMessage::Subscribe(req) => {
                        handle_subscribe(&*store, room_id, last_seq, &mut subscribers, req).await;
                    }
                    ActorMessage::Unsubscribe(id) => {
                        subscribers.remove(&id);
                    }
                }
            }
        }
    }
}

enum ProcessOutcome<S> {
    Persisted {
        result: CommandResult,
        new_state: S,
        new_last_seq: u64,
        broadcast_events: Vec<ProjectedSource>,
    },
    NotPersisted(CommandResult),
    Storage(EventStoreError),
    Fatal(String),
}

/// What gets handed to `broadcast`: the durable event plus the state it
/// resulted in, bundled so the fan-out step doesn't need to re-derive
/// per-viewer projections of state (only of each event).
struct ProjectedSource {
    event: crate::model::Event,
}

#[allow(clippy::too_many_arguments)]
async fn process_command<R: RuleEngine>(
    engine: &R,
    store: &dyn EventStore,
    config: &RoomActorConfig,
    room_id: RoomId,
    state: &R::State,
    last_seq: u64,
    cmd: CommandEnvelope,
) -> ProcessOutcome<R::State> {
    // Step 1: envelope check.
    if cmd.room_id != room_id {
        return ProcessOutcome::NotPersisted(CommandResult::Rejected {
            code: "wrong_room".to_string(),
            message: format!("command addressed room {} to actor for room {room_id}", cmd.room_id),
        });
    }

    // Step 2: dedup lookup. Owned copies of the key parts outlive `cmd`,
    // which gets consumed into the append request further down.
    let actor = cmd.actor_user_id;
    let idempotency_key = cmd.idempotency_key.clone();
    let command_type = cmd.command_type.clone();
    match store.get_dedup(room_id, actor, &idempotency_key, &command_type).await {
        Ok(Some(existing)) => {
            return ProcessOutcome::NotPersisted(dedup_hit_result(existing.result));
        }
        Ok(None) => {}
        Err(error) => return ProcessOutcome::Storage(error),
    }

    // Step 3: rule engine. Must be CPU-only and pure; guarded with
    // `catch_unwind` since a panicking engine must not take the whole
    // process down with it — only this room's actor.
    let handled = match std::panic::catch_unwind(AssertUnwindSafe(|| {
        engine.handle_command(state, &cmd)
    })) {
        Ok(Ok(handled)) => handled,
        Ok(Err(Rejection { code, message })) => {
            return ProcessOutcome::NotPersisted(CommandResult::Rejected { code, message });
        }
        Err(panic) => {
            let message = panic_message(&panic);
            return ProcessOutcome::Fatal(format!("rule engine panicked: {message}"));
        }
    };

    // Step 4: optimistic next-state projection. Provisional sequence
    // numbers must match what `append` will assign, guaranteed by the
    // single-writer discipline.
    let now = chrono::Utc::now();
    let mut provisional_seq = last_seq;
    let provisional_events: Vec<_> = handled
        .events
        .iter()
        .cloned()
        .map(|new_event| {
            provisional_seq += 1;
            new_event.into_event(room_id, provisional_seq, now)
        })
        .collect();

    let next_state = match apply_history(engine, engine.copy_state(state), &provisional_events, last_seq) {
        Ok(state) => state,
        Err(error) => return ProcessOutcome::Fatal(format!("next-state projection failed: {error}")),
    };
    let next_last_seq = provisional_seq;

    let applied_seq_from = last_seq + 1;
    let applied_seq_to = next_last_seq;
    let result = CommandResult::Accepted {
        applied_seq_from,
        applied_seq_to,
        data: handled.result_data,
    };

    let snapshot = if config.snapshot_interval > 0
        && !handled.events.is_empty()
        && next_last_seq % config.snapshot_interval == 0
    {
        Some(NewSnapshot {
            last_seq: next_last_seq,
            state_blob: engine.marshal(&next_state),
        })
    } else {
        None
    };

    // Step 5: persist.
    let append_result = store
        .append(
            room_id,
            AppendRequest {
                events: handled.events,
                dedup: NewDedupRecord {
                    actor_user_id: actor,
                    idempotency_key: idempotency_key.clone(),
                    command_type: command_type.clone(),
                    command_id: cmd.command_id,
                    result: result.clone(),
                },
                snapshot,
            },
        )
        .await;

    let persisted_events = match append_result {
        Ok(events) => events,
        Err(EventStoreError::Duplicate) => {
            // Another command with the same key slipped in between our own
            // dedup lookup and this append; re-resolve via dedup rather
            // than surfacing a spurious conflict to the caller.
            return match store.get_dedup(room_id, actor, &idempotency_key, &command_type).await {
                Ok(Some(existing)) => ProcessOutcome::NotPersisted(dedup_hit_result(existing.result)),
                Ok(None) => ProcessOutcome::Storage(EventStoreError::Duplicate),
                Err(error) => ProcessOutcome::Storage(error),
            };
        }
        Err(EventStoreError::Conflict { room_id }) => {
            return ProcessOutcome::Fatal(format!("event store reported a sequence conflict for room {room_id}"));
        }
        Err(error) => return ProcessOutcome::Storage(error),
    };

    // Step 6/7: publish + hand broadcast sources back to the run loop.
    ProcessOutcome::Persisted {
        result,
        new_state: next_state,
        new_last_seq: next_last_seq,
        broadcast_events: persisted_events
            .into_iter()
            .map(|event| ProjectedSource { event })
            .collect(),
    }
}

fn dedup_hit_result(result: CommandResult) -> CommandResult {
    match result {
        CommandResult::Accepted { applied_seq_from, applied_seq_to, data } => {
            CommandResult::Duplicate { applied_seq_from, applied_seq_to, data }
        }
        other => other,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Fan out every persisted event to every subscriber it's visible to. One
/// short-lived task per *subscriber*, bounded by a semaphore sized to the
/// subscriber count, so one slow sink can't stall the actor loop — the
/// broadcast step fans out a fixed amount of work per event and returns.
///
/// A single command can produce more than one event (spec §4.1's `append`
/// takes an event list), and within one room all subscribers must observe
/// events in strictly ascending `seq` order (spec §5, testable property 2).
/// One task per `(event, subscriber)` pair cannot guarantee that — tokio
/// gives no ordering between independently spawned tasks, so two events
/// from the same command could race to the same sink out of order. Each
/// subscriber therefore gets exactly one task that walks `events` in order
/// and delivers sequentially to that subscriber's own sink; ordering across
/// *different* subscribers needs no coordination since each has its own sink.
async fn broadcast(subscribers: &HashMap<SubscriptionId, SubscriberEntry>, events: &[ProjectedSource]) {
    if subscribers.is_empty() {
        return;
    }

    let permits = Arc::new(Semaphore::new(subscribers.len().max(1)));
    let mut tasks = Vec::with_capacity(subscribers.len());

    for entry in subscribers.values() {
        let projected: Vec<_> = events
            .iter()
            .filter_map(|source| projection::project_event(&source.event, entry.viewer))
            .collect();
        if projected.is_empty() {
            continue;
        }

        let sink = entry.sink.clone();
        let degraded = Arc::clone(&entry.degraded);
        let permits = Arc::clone(&permits);
        tasks.push(tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            for event in projected {
                if sink.try_send(event).is_err() {
                    degraded.store(true, Ordering::Relaxed);
                }
            }
        }));
    }

    for task in tasks {
        let _ = task.await;
    }
}

async fn handle_subscribe(
    store: &dyn EventStore,
    room_id: RoomId,
    recorded_last_seq: u64,
    subscribers: &mut HashMap<SubscriptionId, SubscriberEntry>,
    req: SubscribeRequest,
) {
    let replay = store.load_events_after(room_id, req.last_seq, 0).await;
    let events = match replay {
        Ok(events) => events,
        Err(error) => {
            tracing::warn!(room_id = %room_id, %error, "replay failed for new subscriber");
            return;
        }
    };

    for event in &events {
        if event.seq > recorded_last_seq {
            break;
        }
        if let Some(projected) = projection::project_event(event, req.viewer) {
            let _ = req.sink.send(projected).await;
        }
    }

    let id = SubscriptionId::new_v4();
    subscribers.insert(
        id,
        SubscriberEntry {
            viewer: req.viewer,
            sink: req.sink,
            degraded: Arc::new(AtomicBool::new(false)),
        },
    );

    let _ = req.reply.send(SubscriptionHandle { id });
}
