use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::directory::RoomDirectory;
use crate::event_store::EventStore;
use crate::model::{CommandEnvelope, RoomId, Viewer};
use crate::room_actor::RoomActorHandle;
use crate::room_registry::RoomRegistry;
use crate::rule_engine::RuleEngine;
use crate::wire::{InboundMessage, OutboundMessage};

/// Everything the transport layer needs, shared by every connection.
/// Generic over the rule engine because `RoomRegistry::get_or_create` is:
/// the process runs exactly one rule engine implementation, chosen and
/// injected at startup.
pub struct AppState<R: RuleEngine> {
    pub registry: Arc<RoomRegistry>,
    pub engine: Arc<R>,
    pub directory: Arc<dyn RoomDirectory>,
    pub store: Arc<dyn EventStore>,
    pub subscriber_buffer_size: usize,
}

/// `?user_id=<uuid>&storyteller=true` stands in for the real, externally
/// owned authentication this core does not implement (JWT issuance and
/// session management belong to an external identity service).
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub user_id: Uuid,
    #[serde(default)]
    pub storyteller: bool,
}

pub fn router<R: RuleEngine>() -> Router<Arc<AppState<R>>> {
    Router::new().route("/ws", get(websocket_handler::<R>))
}

pub async fn websocket_handler<R: RuleEngine>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<R>>>,
    Query(params): Query<ConnectParams>,
) -> Response {
    let viewer = Viewer {
        user_id: params.user_id,
        is_storyteller: params.storyteller,
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, viewer))
}

struct Subscription {
    handle: RoomActorHandle,
    subscription_id: crate::room_actor::SubscriptionId,
}

async fn handle_socket<R: RuleEngine>(socket: WebSocket, state: Arc<AppState<R>>, viewer: Viewer) {
    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<OutboundMessage>(state.subscriber_buffer_size.max(1));

    let send_task = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut subscriptions: HashMap<RoomId, Subscription> = HashMap::new();

    while let Some(Ok(message)) = receiver.next().await {
        let Message::Text(text) = message else {
            continue;
        };

        let inbound: InboundMessage = match serde_json::from_str(&text) {
            Ok(msg) => msg,
            Err(error) => {
                let _ = out_tx
                    .send(OutboundMessage::Error {
                        room_id: None,
                        message: format!("malformed message: {error}"),
                    })
                    .await;
                continue;
            }
        };

        match inbound {
            InboundMessage::Command {
                command_id,
                room_id,
                command_type,
                idempotency_key,
                last_seen_seq,
                payload,
            } => {
                if !state.directory.is_member(room_id, viewer.user_id) {
                    let _ = out_tx
                        .send(OutboundMessage::Error {
                            room_id: Some(room_id),
                            message: "not a member of this room".to_string(),
                        })
                        .await;
                    continue;
                }

                let handle = state.registry.get_or_create(room_id, Arc::clone(&state.engine));
                let envelope = CommandEnvelope {
                    command_id,
                    room_id,
                    actor_user_id: viewer.user_id,
                    command_type,
                    idempotency_key,
                    last_seen_seq,
                    payload,
                };

                let outcome = match handle.dispatch(envelope).await {
                    Ok(result) => OutboundMessage::CommandResult { command_id, result },
                    Err(error) => OutboundMessage::Error {
                        room_id: Some(room_id),
                        message: error.to_string(),
                    },
                };
                let _ = out_tx.send(outcome).await;
            }
            InboundMessage::Subscribe { room_id, last_seq } => {
                if !state.directory.is_member(room_id, viewer.user_id) {
                    let _ = out_tx
                        .send(OutboundMessage::Error {
                            room_id: Some(room_id),
                            message: "not a member of this room".to_string(),
                        })
                        .await;
                    continue;
                }

                let handle = state.registry.get_or_create(room_id, Arc::clone(&state.engine));
                let (sink, mut sink_rx) = mpsc::channel(state.subscriber_buffer_size.max(1));

                match handle.subscribe(viewer, last_seq, sink).await {
                    Ok(subscription_handle) => {
                        subscriptions.insert(
                            room_id,
                            Subscription {
                                handle: handle.clone(),
                                subscription_id: subscription_handle.id,
                            },
                        );

                        let relay_tx = out_tx.clone();
                        tokio::spawn(async move {
                            while let Some(event) = sink_rx.recv().await {
                                if relay_tx.send(OutboundMessage::Event(event)).await.is_err() {
                                    break;
                                }
                            }
                        });

                        let _ = out_tx.send(OutboundMessage::Subscribed { room_id }).await;
                    }
                    Err(error) => {
                        let _ = out_tx
                            .send(OutboundMessage::Error {
                                room_id: Some(room_id),
                                message: error.to_string(),
                            })
                            .await;
                    }
                }
            }
            InboundMessage::Unsubscribe { room_id } => {
                if let Some(subscription) = subscriptions.remove(&room_id) {
                    subscription.handle.unsubscribe(subscription.subscription_id).await;
                }
            }
        }
    }

    // Transport close: unsubscribe everything this socket held open. The
    // core tolerates subscribers disappearing silently; this just speeds up
    // cleanup instead of waiting for a stale send to fail.
    for (_, subscription) in subscriptions {
        subscription.handle.unsubscribe(subscription.subscription_id).await;
    }
    send_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_params_default_storyteller_is_false() {
        let raw = serde_json::json!({ "user_id": Uuid::new_v4() });
        let params: ConnectParams = serde_json::from_value(raw).unwrap();
        assert!(!params.storyteller);
    }
}
